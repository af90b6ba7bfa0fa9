/// RunOnDrop runs a function when it gets dropped, providing a
/// similar convention to go's defer. It also runs when the owning
/// thread unwinds from a panic.
pub struct RunOnDrop<F: FnOnce()>(Option<F>);

impl<F: FnOnce()> RunOnDrop<F> {
    pub fn new(f: F) -> Self {
        Self(Some(f))
    }
}

impl<F: FnOnce()> Drop for RunOnDrop<F> {
    fn drop(&mut self) {
        if let Some(cb) = self.0.take() {
            cb();
        }
    }
}

#[cfg(test)]
mod test_run_on_drop {
    use std::cell::Cell;

    use super::RunOnDrop;

    #[test]
    fn runs_on_scope_exit() {
        let ran = Cell::new(false);
        {
            let _guard = RunOnDrop::new(|| ran.set(true));
        }
        assert!(ran.get());
    }

    #[test]
    fn runs_while_unwinding() {
        let ran = Cell::new(false);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = RunOnDrop::new(|| ran.set(true));
            panic!("unwind through the guard");
        }));
        assert!(result.is_err());
        assert!(ran.get());
    }
}
