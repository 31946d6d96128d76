use preview::{ActivityLog, ShaderLanguage, ShaderSourceText};
use translate::{TranslateError, Translation, Translator};

/// One user's sequence of requests against a [`Translator`].
///
/// The last successful result stays current until another request succeeds;
/// failures only add a log entry.
pub struct Session<T> {
    translator: T,
    current: Option<Translation>,
    log: ActivityLog,
}

impl<T: Translator> Session<T> {
    pub fn new(translator: T) -> Self {
        Self {
            translator,
            current: None,
            log: ActivityLog::new(),
        }
    }

    pub fn current(&self) -> Option<&Translation> {
        self.current.as_ref()
    }

    pub fn log(&self) -> &ActivityLog {
        &self.log
    }

    pub fn translate(
        &mut self,
        source: &ShaderSourceText,
        target: ShaderLanguage,
    ) -> Result<&Translation, TranslateError> {
        let what = format!("translation {} -> {}", source.language(), target);
        let result = self.translator.translate(source, target);
        self.record(&what, result)
    }

    pub fn optimize(&mut self, source: &ShaderSourceText) -> Result<&Translation, TranslateError> {
        let what = format!("{} optimization", source.language());
        let result = self.translator.optimize(source);
        self.record(&what, result)
    }

    pub fn analyze(&mut self, source: &ShaderSourceText) -> Result<String, TranslateError> {
        match self.translator.analyze(source) {
            Ok(text) => {
                self.log.info(format!("{} analysis finished", source.language()));
                Ok(text)
            }
            Err(err) => {
                self.log
                    .error(format!("{} analysis failed: {err}", source.language()));
                Err(err)
            }
        }
    }

    fn record(
        &mut self,
        what: &str,
        result: Result<Translation, TranslateError>,
    ) -> Result<&Translation, TranslateError> {
        match result {
            Ok(translation) => {
                self.log.info(format!("{what} finished"));
                let current = self.current.insert(translation);
                Ok(&*current)
            }
            Err(err) => {
                self.log.error(format!("{what} failed: {err}"));
                tracing::warn!(error = %err, "{what} failed; keeping previous output");
                Err(err)
            }
        }
    }
}
