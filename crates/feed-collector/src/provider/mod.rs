//! 업스트림 시세 공급자.

mod yahoo;

pub use yahoo::YahooQuoteSource;

use async_trait::async_trait;
use feed_core::{FetchRequest, Quote};

use crate::Result;

/// 시세 공급자 trait.
///
/// 한 번의 호출은 한 번의 시도이며 재시도는 [`crate::ProviderFetcher`]가 담당합니다.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// 공급자 이름.
    fn name(&self) -> &str;

    /// 심볼의 샘플을 시간순으로 반환합니다.
    ///
    /// `FetchRequest::Latest`는 최대 한 개의 샘플을 반환합니다.
    async fn fetch_quotes(&self, symbol: &str, request: &FetchRequest) -> Result<Vec<Quote>>;
}
