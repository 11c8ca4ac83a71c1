//! 상품 → 공급자 심볼 카탈로그.
//!
//! 설정에서 읽은 통화 목록과 시장별 지수 목록을 Yahoo Finance 심볼로
//! 변환합니다. 프로세스 시작 시 한 번 생성되며 이후 변경되지 않습니다.

use std::collections::{BTreeMap, BTreeSet};

use crate::{Instrument, SymbolSpec};

/// 달러 인덱스 계산에 사용하는 EUR/USD 심볼.
pub const USD_INDEX_SOURCE_SYMBOL: &str = "EURUSD=X";

/// 역외 위안화는 단일 심볼로 조회가 불안정하여 대체 심볼을 순서대로 시도합니다.
const CNH_FALLBACK_SYMBOLS: [&str; 3] = ["USDCNH=X", "CNH=F", "CNHUSD=X"];

/// 카탈로그 항목.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub instrument: Instrument,
    pub symbols: SymbolSpec,
}

/// 상품별 공급자 심볼 카탈로그.
#[derive(Debug, Clone, Default)]
pub struct SymbolCatalog {
    entries: Vec<CatalogEntry>,
}

impl SymbolCatalog {
    /// 통화 목록과 시장별 지수 목록으로 카탈로그를 생성합니다.
    ///
    /// 항목 순서: 달러 인덱스 → 통화(설정 순) → 지수(시장 코드 순).
    /// 중복 통화는 한 번만 등록됩니다.
    pub fn new(currencies: &[String], stocks: &BTreeMap<String, Vec<String>>) -> Self {
        let mut entries = vec![CatalogEntry {
            instrument: Instrument::UsdIndex,
            symbols: SymbolSpec::single(USD_INDEX_SOURCE_SYMBOL),
        }];

        let mut seen = BTreeSet::new();
        for currency in currencies {
            let currency = currency.trim().to_uppercase();
            if currency.is_empty() || !seen.insert(currency.clone()) {
                continue;
            }
            entries.push(CatalogEntry {
                symbols: currency_symbols(&currency),
                instrument: Instrument::exchange_rate(currency),
            });
        }

        for (market, symbols) in stocks {
            for symbol in symbols {
                entries.push(CatalogEntry {
                    instrument: Instrument::stock_price(market, symbol.as_str()),
                    symbols: SymbolSpec::single(symbol.as_str()),
                });
            }
        }

        Self { entries }
    }

    /// 전체 항목 (수집 순서).
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn usd_index(&self) -> Option<&CatalogEntry> {
        self.entries
            .iter()
            .find(|e| matches!(e.instrument, Instrument::UsdIndex))
    }

    pub fn currencies(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries
            .iter()
            .filter(|e| matches!(e.instrument, Instrument::ExchangeRate { .. }))
    }

    pub fn stocks(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries
            .iter()
            .filter(|e| matches!(e.instrument, Instrument::StockPrice { .. }))
    }

    /// 상품의 공급자 심볼 목록.
    pub fn symbols_for(&self, instrument: &Instrument) -> Option<&SymbolSpec> {
        self.entries
            .iter()
            .find(|e| &e.instrument == instrument)
            .map(|e| &e.symbols)
    }

    /// 설정된 통화 코드 집합 (정리 작업용).
    pub fn configured_currencies(&self) -> BTreeSet<String> {
        self.currencies()
            .filter_map(|e| match &e.instrument {
                Instrument::ExchangeRate { quote, .. } => Some(quote.clone()),
                _ => None,
            })
            .collect()
    }

    /// 설정된 (시장, 심볼) 집합 (정리 작업용).
    pub fn configured_stocks(&self) -> BTreeSet<(String, String)> {
        self.stocks()
            .filter_map(|e| match &e.instrument {
                Instrument::StockPrice { market, symbol, .. } => {
                    Some((market.clone(), symbol.clone()))
                }
                _ => None,
            })
            .collect()
    }
}

/// 통화 코드에 대한 Yahoo Finance 환율 심볼 목록.
pub fn currency_symbols(currency: &str) -> SymbolSpec {
    if currency == "CNH" {
        SymbolSpec::new(CNH_FALLBACK_SYMBOLS)
    } else {
        SymbolSpec::single(format!("USD{}=X", currency))
    }
}
