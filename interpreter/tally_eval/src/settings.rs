//! Session settings and their mode stacks.
//!
//! Every togglable setting (and precision, and trig units) keeps a
//! stack of prior values. A directive with a block pushes before the
//! block and pops after it, on success and on error alike; a bare
//! directive pushes and leaves the new value in force. `pop` with an
//! empty stack falls back to the session's initial value.

use rustc_hash::FxHashMap;
use tally_ir::{ModeSetting, TrigUnits};
use tally_num::{MathContext, TrigMode};

/// Default decimal digits kept by rounding operations.
pub const DEFAULT_PRECISION: u64 = 0;

#[derive(Debug)]
pub struct Settings {
    modes: FxHashMap<ModeSetting, bool>,
    initial_modes: FxHashMap<ModeSetting, bool>,
    mode_stacks: FxHashMap<ModeSetting, Vec<bool>>,
    precision: u64,
    initial_precision: u64,
    precision_stack: Vec<u64>,
    trig_units: TrigUnits,
}

impl Settings {
    pub fn new() -> Self {
        let mut modes = FxHashMap::default();
        for setting in ModeSetting::ALL {
            modes.insert(setting, false);
        }
        Settings {
            initial_modes: modes.clone(),
            modes,
            mode_stacks: FxHashMap::default(),
            precision: DEFAULT_PRECISION,
            initial_precision: DEFAULT_PRECISION,
            precision_stack: Vec::new(),
            trig_units: TrigUnits::Radians,
        }
    }

    /// Seed an initial value before any scripts run, so `:mode initial`
    /// and startup flags agree.
    pub fn seed_mode(&mut self, setting: ModeSetting, value: bool) {
        self.modes.insert(setting, value);
        self.initial_modes.insert(setting, value);
    }

    pub fn mode(&self, setting: ModeSetting) -> bool {
        self.modes.get(&setting).copied().unwrap_or(false)
    }

    /// Push the current value and switch to `value`.
    pub fn push_mode(&mut self, setting: ModeSetting, value: bool) {
        let current = self.mode(setting);
        self.mode_stacks.entry(setting).or_default().push(current);
        self.modes.insert(setting, value);
    }

    /// Restore the previous value; the initial value when the stack is
    /// empty.
    pub fn pop_mode(&mut self, setting: ModeSetting) -> bool {
        let restored = self
            .mode_stacks
            .get_mut(&setting)
            .and_then(Vec::pop)
            .unwrap_or_else(|| self.initial_modes.get(&setting).copied().unwrap_or(false));
        self.modes.insert(setting, restored);
        restored
    }

    pub fn reset_mode(&mut self, setting: ModeSetting) -> bool {
        let initial = self.initial_modes.get(&setting).copied().unwrap_or(false);
        self.modes.insert(setting, initial);
        initial
    }

    pub fn precision(&self) -> u64 {
        self.precision
    }

    pub fn seed_precision(&mut self, digits: u64) {
        self.precision = digits;
        self.initial_precision = digits;
    }

    pub fn push_precision(&mut self, digits: u64) {
        self.precision_stack.push(self.precision);
        self.precision = digits;
    }

    pub fn pop_precision(&mut self) -> u64 {
        self.precision = self
            .precision_stack
            .pop()
            .unwrap_or(self.initial_precision);
        self.precision
    }

    pub fn reset_precision(&mut self) -> u64 {
        self.precision = self.initial_precision;
        self.precision
    }

    pub fn trig_units(&self) -> TrigUnits {
        self.trig_units
    }

    pub fn set_trig_units(&mut self, units: TrigUnits) {
        self.trig_units = units;
    }

    pub fn trig_mode(&self) -> TrigMode {
        match self.trig_units {
            TrigUnits::Degrees => TrigMode::Degrees,
            TrigUnits::Radians => TrigMode::Radians,
            TrigUnits::Grads => TrigMode::Grads,
        }
    }

    /// The rounding context for the current precision. Precision 0
    /// means unlimited storage with a bounded divide precision.
    pub fn math_context(&self) -> MathContext {
        if self.precision == 0 {
            MathContext::DEFAULT
        } else {
            MathContext::with_precision(self.precision)
        }
    }

    pub fn rational(&self) -> bool {
        self.mode(ModeSetting::Rational)
    }

    pub fn ignore_case(&self) -> bool {
        self.mode(ModeSetting::IgnoreCase)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn pop_restores_the_pushed_value() {
        let mut s = Settings::new();
        s.push_mode(ModeSetting::Rational, true);
        assert!(s.rational());
        s.pop_mode(ModeSetting::Rational);
        assert!(!s.rational());
    }

    #[test]
    fn pop_on_empty_stack_yields_the_initial_value() {
        let mut s = Settings::new();
        s.seed_mode(ModeSetting::Separators, true);
        s.pop_mode(ModeSetting::Separators);
        assert!(s.mode(ModeSetting::Separators));
        s.pop_mode(ModeSetting::Separators);
        assert!(s.mode(ModeSetting::Separators));
    }

    #[test]
    fn precision_stack_nests() {
        let mut s = Settings::new();
        s.push_precision(10);
        s.push_precision(50);
        assert_eq!(s.precision(), 50);
        assert_eq!(s.pop_precision(), 10);
        assert_eq!(s.pop_precision(), DEFAULT_PRECISION);
        assert_eq!(s.pop_precision(), DEFAULT_PRECISION);
    }

    #[test]
    fn context_tracks_precision() {
        let mut s = Settings::new();
        s.push_precision(12);
        assert_eq!(s.math_context().precision, 12);
    }
}
