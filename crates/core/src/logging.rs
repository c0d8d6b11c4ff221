use std::fmt::Display;

/// Logger tagged with the name of the component that owns it.
///
/// Informational messages are only emitted in development mode (debug builds
/// unless overridden). Warnings and errors are always emitted.
#[derive(Debug, Clone)]
pub struct ComponentLogger {
    component: &'static str,
    verbose: bool,
}

impl ComponentLogger {
    pub fn new(component: &'static str) -> Self {
        Self::with_verbosity(component, cfg!(debug_assertions))
    }

    pub fn with_verbosity(component: &'static str, verbose: bool) -> Self {
        Self { component, verbose }
    }

    pub fn component(&self) -> &'static str {
        self.component
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    pub fn info(&self, message: impl Display) {
        if self.verbose {
            tracing::info!(component = self.component, "{message}");
        }
    }

    pub fn debug(&self, message: impl Display) {
        if self.verbose {
            tracing::debug!(component = self.component, "{message}");
        }
    }

    pub fn warn(&self, message: impl Display) {
        tracing::warn!(component = self.component, "{message}");
    }

    pub fn error(&self, message: impl Display) {
        tracing::error!(component = self.component, "{message}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_follows_build_mode_by_default() {
        let logger = ComponentLogger::new("AudioTimeline");
        assert_eq!(logger.is_verbose(), cfg!(debug_assertions));
        assert_eq!(logger.component(), "AudioTimeline");
    }

    #[test]
    fn verbosity_can_be_overridden() {
        let mut logger = ComponentLogger::with_verbosity("Session", false);
        logger.info("suppressed");
        logger.warn("always emitted");
        logger.set_verbose(true);
        assert!(logger.is_verbose());
    }
}
