//! 수집 대상 상품과 공급자 심볼 정의.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 환율의 기준 통화 (항상 USD).
pub const BASE_CURRENCY: &str = "USD";

/// 상품 분류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentKind {
    /// 환율 (USD 기준)
    ExchangeRate,
    /// 주가지수
    StockPrice,
    /// EUR/USD에서 파생한 달러 인덱스
    UsdIndex,
}

impl InstrumentKind {
    /// 저장소 테이블/measurement 이름.
    pub fn table_name(&self) -> &'static str {
        match self {
            InstrumentKind::ExchangeRate => "exchange_rates",
            InstrumentKind::StockPrice => "stock_prices",
            InstrumentKind::UsdIndex => "usd_index",
        }
    }
}

impl fmt::Display for InstrumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.table_name())
    }
}

/// 수집 대상 상품.
///
/// 정적 설정에서 생성되며 실행 중에는 변경되지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Instrument {
    /// 환율 (예: USD/EUR)
    ExchangeRate { base: String, quote: String },
    /// 주가지수 (예: US:^DJI). `currency`는 시장에서 결정됩니다.
    StockPrice {
        market: String,
        symbol: String,
        currency: String,
    },
    /// 달러 인덱스 (단일 인스턴스)
    UsdIndex,
}

impl Instrument {
    /// USD 기준 환율 상품을 생성합니다.
    pub fn exchange_rate(quote: impl Into<String>) -> Self {
        Instrument::ExchangeRate {
            base: BASE_CURRENCY.to_string(),
            quote: quote.into().to_uppercase(),
        }
    }

    /// 주가지수 상품을 생성합니다. 통화는 시장 코드로 결정합니다.
    pub fn stock_price(market: impl Into<String>, symbol: impl Into<String>) -> Self {
        let market = market.into().to_uppercase();
        let currency = market_currency(&market).to_string();
        Instrument::StockPrice {
            market,
            symbol: symbol.into(),
            currency,
        }
    }

    /// 상품 분류.
    pub fn kind(&self) -> InstrumentKind {
        match self {
            Instrument::ExchangeRate { .. } => InstrumentKind::ExchangeRate,
            Instrument::StockPrice { .. } => InstrumentKind::StockPrice,
            Instrument::UsdIndex => InstrumentKind::UsdIndex,
        }
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instrument::ExchangeRate { base, quote } => write!(f, "{}/{}", base, quote),
            Instrument::StockPrice { market, symbol, .. } => write!(f, "{}:{}", market, symbol),
            Instrument::UsdIndex => write!(f, "USD_INDEX"),
        }
    }
}

/// 시장 코드에 대응하는 호가 통화.
pub fn market_currency(market: &str) -> &'static str {
    match market {
        "US" => "USD",
        "HK" => "HKD",
        _ => "CNY",
    }
}

/// 상품별로 시도할 공급자 심볼 목록.
///
/// 앞에서부터 순서대로 시도하며 처음 성공한 심볼이 사용됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolSpec {
    candidates: Vec<String>,
}

impl SymbolSpec {
    /// 후보 심볼 목록으로 생성합니다.
    pub fn new<I, S>(candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            candidates: candidates.into_iter().map(Into::into).collect(),
        }
    }

    /// 단일 심볼.
    pub fn single(symbol: impl Into<String>) -> Self {
        Self {
            candidates: vec![symbol.into()],
        }
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    /// 첫 번째 후보 (로그용).
    pub fn primary(&self) -> Option<&str> {
        self.candidates.first().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exchange_rate_is_usd_based() {
        let eur = Instrument::exchange_rate("eur");
        assert_eq!(
            eur,
            Instrument::ExchangeRate {
                base: "USD".to_string(),
                quote: "EUR".to_string()
            }
        );
        assert_eq!(eur.to_string(), "USD/EUR");
        assert_eq!(eur.kind(), InstrumentKind::ExchangeRate);
    }

    #[test]
    fn test_stock_price_currency_from_market() {
        let hsi = Instrument::stock_price("hk", "^HSI");
        assert_eq!(hsi.to_string(), "HK:^HSI");
        match hsi {
            Instrument::StockPrice { currency, .. } => assert_eq!(currency, "HKD"),
            other => panic!("unexpected instrument: {other:?}"),
        }

        assert_eq!(market_currency("US"), "USD");
        assert_eq!(market_currency("CN"), "CNY");
        assert_eq!(market_currency("SG"), "CNY");
    }

    #[test]
    fn test_kind_table_names() {
        assert_eq!(InstrumentKind::ExchangeRate.table_name(), "exchange_rates");
        assert_eq!(InstrumentKind::StockPrice.table_name(), "stock_prices");
        assert_eq!(Instrument::UsdIndex.kind().table_name(), "usd_index");
    }

    #[test]
    fn test_instrument_serde_tagging() {
        let json = serde_json::to_string(&Instrument::UsdIndex).unwrap();
        assert_eq!(json, r#"{"kind":"usd_index"}"#);
    }

    #[test]
    fn test_symbol_spec_order() {
        let spec = SymbolSpec::new(["USDCNH=X", "CNH=F"]);
        assert_eq!(spec.primary(), Some("USDCNH=X"));
        assert_eq!(spec.candidates().len(), 2);
    }
}
