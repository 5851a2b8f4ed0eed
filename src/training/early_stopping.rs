/// Stops training once the monitored loss has not improved by at least
/// `min_delta` for `patience` consecutive checks. A patience of zero never stops.
pub struct EarlyStopping {
    patience: usize,
    min_delta: f32,
    pub best_loss: f32,
    counter: usize,
    pub stopped: bool,
}

impl EarlyStopping {
    pub fn new(patience: usize, min_delta: f32) -> Self {
        Self {
            patience,
            min_delta,
            best_loss: f32::INFINITY,
            counter: 0,
            stopped: false,
        }
    }

    /// Returns true when `current_loss` improves on the best value seen so far.
    pub fn is_improvement(&self, current_loss: f32) -> bool {
        current_loss.is_finite() && current_loss < self.best_loss - self.min_delta
    }

    pub fn should_stop(&mut self, current_loss: f32) -> bool {
        if self.stopped {
            return true;
        }

        if self.is_improvement(current_loss) {
            self.best_loss = current_loss;
            self.counter = 0;
            return false;
        }

        self.counter += 1;
        if self.patience > 0 && self.counter >= self.patience {
            self.stopped = true;
            log::info!(
                "Early stopping triggered! No improvement for {} epochs",
                self.patience
            );
        }
        self.stopped
    }
}
