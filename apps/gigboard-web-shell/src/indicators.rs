/// Global "work in progress" signal raised around every route dispatch.
pub trait BusyIndicator {
    fn show(&self);
    fn hide(&self);
}

/// Raises the indicator on creation and lowers it when dropped, so a failing
/// or panicking handler still releases it.
#[must_use = "the indicator is lowered as soon as the guard is dropped"]
pub struct BusyGuard<'a> {
    indicator: &'a dyn BusyIndicator,
}

impl<'a> BusyGuard<'a> {
    pub fn raise(indicator: &'a dyn BusyIndicator) -> Self {
        indicator.show();
        Self { indicator }
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.indicator.hide();
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingBusyIndicator;

impl BusyIndicator for TracingBusyIndicator {
    fn show(&self) {
        tracing::trace!("busy");
    }

    fn hide(&self) {
        tracing::trace!("idle");
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    #[derive(Default)]
    struct Log(RefCell<Vec<&'static str>>);

    impl BusyIndicator for Log {
        fn show(&self) {
            self.0.borrow_mut().push("show");
        }

        fn hide(&self) {
            self.0.borrow_mut().push("hide");
        }
    }

    #[test]
    fn guard_lowers_indicator_on_early_return() {
        fn fails(indicator: &dyn BusyIndicator) -> Result<(), &'static str> {
            let _busy = BusyGuard::raise(indicator);
            "not a number".parse::<u8>().map_err(|_| "boom")?;
            Ok(())
        }

        let log = Log::default();
        assert_eq!(fails(&log), Err("boom"));
        assert_eq!(*log.0.borrow(), vec!["show", "hide"]);
    }
}
