//! Process-wide kill-switch and per-symbol status, readable lock-free from every
//! engine's hot admission path and written only by the (rare) admin path.
//!
//! Modeled as independent atomics rather than a single copy-on-write snapshot
//! struct: the state here is two small fields, so per-field atomics give the
//! same "single atomic load on the hot path" property §9 asks for without
//! introducing a swap-pointer abstraction for something this small.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use dashmap::DashMap;

use crate::error::ControlError;

/// Trading status of a single symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SymbolStatus {
    Trading = 1,
    Halt = 2,
    CancelOnly = 3,
}

impl SymbolStatus {
    fn from_u8(v: u8) -> Self {
        match v {
            2 => SymbolStatus::Halt,
            3 => SymbolStatus::CancelOnly,
            _ => SymbolStatus::Trading,
        }
    }
}

pub(crate) fn validate_symbol(symbol: &str) -> Result<(), ControlError> {
    let valid = !symbol.is_empty()
        && symbol.len() <= 32
        && symbol
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(ControlError::InvalidSymbol(symbol.to_string()))
    }
}

/// Global kill-switch plus per-symbol status, shared (via `Arc`) between the
/// admin surface and every engine host.
#[derive(Debug, Default)]
pub struct ControlPlane {
    kill_switch: AtomicBool,
    symbol_status: DashMap<String, AtomicU8>,
}

impl ControlPlane {
    pub fn new() -> Self {
        Self {
            kill_switch: AtomicBool::new(false),
            symbol_status: DashMap::new(),
        }
    }

    #[inline]
    pub fn kill_switch_engaged(&self) -> bool {
        self.kill_switch.load(Ordering::Relaxed)
    }

    pub fn set_kill_switch(&self, engaged: bool) {
        self.kill_switch.store(engaged, Ordering::Release);
    }

    #[inline]
    pub fn symbol_status(&self, symbol: &str) -> SymbolStatus {
        self.symbol_status
            .get(symbol)
            .map(|flag| SymbolStatus::from_u8(flag.load(Ordering::Relaxed)))
            .unwrap_or(SymbolStatus::Trading)
    }

    pub fn set_symbol_status(&self, symbol: &str, status: SymbolStatus) -> Result<(), ControlError> {
        validate_symbol(symbol)?;
        self.symbol_status
            .entry(symbol.to_string())
            .or_insert_with(|| AtomicU8::new(SymbolStatus::Trading as u8))
            .store(status as u8, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_trading_and_disengaged() {
        let control = ControlPlane::new();
        assert!(!control.kill_switch_engaged());
        assert_eq!(control.symbol_status("BTCUSDT"), SymbolStatus::Trading);
    }

    #[test]
    fn kill_switch_round_trips() {
        let control = ControlPlane::new();
        control.set_kill_switch(true);
        assert!(control.kill_switch_engaged());
    }

    #[test]
    fn symbol_status_round_trips() {
        let control = ControlPlane::new();
        control
            .set_symbol_status("BTCUSDT", SymbolStatus::Halt)
            .unwrap();
        assert_eq!(control.symbol_status("BTCUSDT"), SymbolStatus::Halt);
    }

    #[test]
    fn rejects_invalid_symbol() {
        let control = ControlPlane::new();
        let err = control.set_symbol_status("btc-usdt", SymbolStatus::Halt);
        assert!(err.is_err());
    }
}
