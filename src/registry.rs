//! Instrument Registry.
//!
//! Static, loaded-once table mapping a trading symbol to the per-symbol
//! decisions every other component depends on: the upstream ticker id, the
//! quoted spread, decimal precision, and contract size. Symbols outside the
//! built-in explicit table fall back to a classification function — the
//! rules in `classify_decimals`/`classify_spread`/`classify_contract_size`
//! are contract, pinned by tests, and must not be "simplified".

use std::collections::HashMap;
use std::path::Path;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;

use crate::error::RegistryError;

const COMMODITIES: &[&str] = &["GOLD", "SILVER", "OIL", "COPPER", "NATURALGAS"];
const INDICES: &[&str] = &["SPX500", "NASDAQ", "DJI", "FTSE100", "DAX", "NIKKEI"];
const CRYPTO: &[&str] = &["BTCUSD", "ETHUSD", "BNBUSD", "ADAUSD", "XRPUSD", "SOLUSD"];

#[derive(Debug, Clone, PartialEq)]
pub struct Instrument {
    pub symbol: String,
    pub upstream_ticker: String,
    pub spread: Decimal,
    pub decimals: u32,
    pub contract_size: Decimal,
}

/// Explicit, file-overridable entries keyed by symbol. Fields left `None`
/// fall back to the classification rules.
#[derive(Debug, Deserialize)]
struct RegistryOverride {
    upstream_ticker: Option<String>,
    spread: Option<Decimal>,
    decimals: Option<u32>,
    contract_size: Option<Decimal>,
}

#[derive(Debug, Deserialize, Default)]
struct RegistryFile {
    #[serde(flatten)]
    entries: HashMap<String, RegistryOverride>,
}

pub struct Registry {
    instruments: HashMap<String, Instrument>,
}

impl Registry {
    /// Build the registry from the built-in default table, optionally layering
    /// a TOML override file on top.
    pub fn load(override_path: Option<&Path>) -> Result<Self, RegistryError> {
        let mut instruments = HashMap::new();
        for symbol in builtin_tickers().keys() {
            instruments.insert(symbol.to_string(), classify(symbol));
        }

        if let Some(path) = override_path {
            let raw = std::fs::read_to_string(path)
                .map_err(|e| RegistryError::InvalidOverride(format!("{}: {}", path.display(), e)))?;
            let file: RegistryFile = toml::from_str(&raw)
                .map_err(|e| RegistryError::InvalidOverride(e.to_string()))?;
            for (symbol, over) in file.entries {
                let base = instruments
                    .remove(&symbol)
                    .unwrap_or_else(|| classify(&symbol));
                instruments.insert(
                    symbol.clone(),
                    Instrument {
                        symbol: symbol.clone(),
                        upstream_ticker: over.upstream_ticker.unwrap_or(base.upstream_ticker),
                        spread: over.spread.unwrap_or(base.spread),
                        decimals: over.decimals.unwrap_or(base.decimals),
                        contract_size: over.contract_size.unwrap_or(base.contract_size),
                    },
                );
            }
        }

        Ok(Self { instruments })
    }

    /// Ensure every symbol in `universe` resolves to an instrument, synthesizing
    /// classification-derived defaults for any not already present.
    pub fn ensure_universe(&mut self, universe: &[String]) {
        for symbol in universe {
            self.instruments
                .entry(symbol.clone())
                .or_insert_with(|| classify(symbol));
        }
    }

    pub fn get(&self, symbol: &str) -> Result<&Instrument, RegistryError> {
        self.instruments
            .get(symbol)
            .ok_or_else(|| RegistryError::UnknownSymbol(symbol.to_string()))
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.instruments.contains_key(symbol)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.instruments.keys().map(|s| s.as_str())
    }
}

/// The explicit default table: symbol -> upstream ticker id, mirroring the
/// source system's 1:1 symbol-to-provider-ticker map.
fn builtin_tickers() -> HashMap<&'static str, &'static str> {
    HashMap::from([
        ("EURUSD", "EURUSD=X"),
        ("GBPUSD", "GBPUSD=X"),
        ("USDJPY", "USDJPY=X"),
        ("AUDUSD", "AUDUSD=X"),
        ("USDCAD", "USDCAD=X"),
        ("USDCHF", "USDCHF=X"),
        ("NZDUSD", "NZDUSD=X"),
        ("EURGBP", "EURGBP=X"),
        ("EURJPY", "EURJPY=X"),
        ("GBPJPY", "GBPJPY=X"),
        ("AUDJPY", "AUDJPY=X"),
        ("GBPAUD", "GBPAUD=X"),
        ("EURCAD", "EURCAD=X"),
        ("EURAUD", "EURAUD=X"),
        ("GOLD", "GC=F"),
        ("SILVER", "SI=F"),
        ("OIL", "CL=F"),
        ("COPPER", "HG=F"),
        ("NATURALGAS", "NG=F"),
        ("SPX500", "^GSPC"),
        ("NASDAQ", "^IXIC"),
        ("DJI", "^DJI"),
        ("FTSE100", "^FTSE"),
        ("DAX", "^GDAXI"),
        ("NIKKEI", "^N225"),
        ("BTCUSD", "BTC-USD"),
        ("ETHUSD", "ETH-USD"),
        ("BNBUSD", "BNB-USD"),
        ("XRPUSD", "XRP-USD"),
        ("ADAUSD", "ADA-USD"),
        ("SOLUSD", "SOL-USD"),
    ])
}

/// Explicit spreads for the built-in table. Deliberately does NOT include
/// every built-in symbol: `SOLUSD` is absent here the same way it is absent
/// from the source system's literal spread table, so it falls through to
/// `classify_spread` and picks up the default forex-sized spread. See
/// DESIGN.md.
fn builtin_spreads() -> HashMap<&'static str, Decimal> {
    HashMap::from([
        ("EURUSD", dec!(0.0002)),
        ("GBPUSD", dec!(0.0002)),
        ("USDJPY", dec!(0.02)),
        ("AUDUSD", dec!(0.0002)),
        ("USDCAD", dec!(0.0002)),
        ("USDCHF", dec!(0.0002)),
        ("NZDUSD", dec!(0.0002)),
        ("EURGBP", dec!(0.0002)),
        ("EURJPY", dec!(0.02)),
        ("GBPJPY", dec!(0.02)),
        ("AUDJPY", dec!(0.02)),
        ("GBPAUD", dec!(0.0002)),
        ("EURCAD", dec!(0.0002)),
        ("EURAUD", dec!(0.0002)),
        ("GOLD", dec!(0.50)),
        ("SILVER", dec!(0.05)),
        ("OIL", dec!(0.05)),
        ("COPPER", dec!(0.05)),
        ("NATURALGAS", dec!(0.05)),
        ("SPX500", dec!(0.50)),
        ("NASDAQ", dec!(1.00)),
        ("DJI", dec!(5.00)),
        ("FTSE100", dec!(5.00)),
        ("DAX", dec!(5.00)),
        ("NIKKEI", dec!(10.00)),
        ("BTCUSD", dec!(50.00)),
        ("ETHUSD", dec!(5.00)),
        ("BNBUSD", dec!(5.00)),
        ("XRPUSD", dec!(0.005)),
        ("ADAUSD", dec!(0.005)),
    ])
}

/// Build an `Instrument` for `symbol` via the built-in ticker/spread tables
/// where present, falling back to the classification rules for anything
/// those tables omit (including symbols outside the built-in universe
/// entirely).
fn classify(symbol: &str) -> Instrument {
    let tickers = builtin_tickers();
    let spreads = builtin_spreads();

    let upstream_ticker = tickers
        .get(symbol)
        .map(|s| s.to_string())
        .unwrap_or_else(|| symbol.to_string());
    let spread = spreads.get(symbol).copied().unwrap_or_else(|| classify_spread(symbol));

    Instrument {
        symbol: symbol.to_string(),
        upstream_ticker,
        spread,
        decimals: classify_decimals(symbol),
        contract_size: classify_contract_size(symbol),
    }
}

/// Decimal precision is always classification-derived, even for built-in
/// symbols: the source system never overrides it from a literal table.
pub fn classify_decimals(symbol: &str) -> u32 {
    if symbol.contains("JPY") {
        2
    } else if COMMODITIES.contains(&symbol) || INDICES.contains(&symbol) || CRYPTO.contains(&symbol)
    {
        2
    } else {
        5
    }
}

pub fn classify_spread(symbol: &str) -> Decimal {
    if symbol.contains("JPY") {
        dec!(0.02)
    } else if symbol == "GOLD" {
        dec!(0.50)
    } else if COMMODITIES.contains(&symbol) {
        dec!(0.05)
    } else if INDICES.contains(&symbol) {
        if symbol == "NIKKEI" {
            dec!(10.00)
        } else {
            dec!(5.00)
        }
    } else if symbol.starts_with("BTC") || symbol.starts_with("ETH") {
        dec!(50.00)
    } else {
        dec!(0.0002)
    }
}

pub fn classify_contract_size(symbol: &str) -> Decimal {
    if symbol.contains("BTC") || symbol.contains("ETH") {
        dec!(1)
    } else if symbol.contains("XRP") || symbol.contains("ADA") {
        dec!(100000)
    } else if symbol == "GOLD" {
        dec!(100)
    } else if symbol == "SILVER" || symbol == "COPPER" {
        dec!(5000)
    } else if symbol == "OIL" || symbol == "NATURALGAS" {
        dec!(1000)
    } else if symbol.len() == 6 && symbol.chars().all(|c| c.is_ascii_uppercase()) {
        dec!(100000)
    } else {
        dec!(100)
    }
}
