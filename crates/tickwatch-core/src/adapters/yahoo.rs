use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde::Deserialize;

use crate::circuit_breaker::CircuitBreaker;
use crate::http_client::{HttpClient, HttpRequest, NoopHttpClient};
use crate::provider::{ProviderError, QuoteProvider};
use crate::{DateRange, HistoryEntry, QuoteSnapshot, Symbol, TradingDay, UtcDateTime};

const CRUMB_TTL_SECS: u64 = 3600;

/// Cached Yahoo crumb token. The unofficial API wants a session cookie
/// (held in the transport's cookie jar) plus a crumb query parameter.
#[derive(Default)]
struct CrumbCache {
    crumb: Option<String>,
    fetched_at: Option<Instant>,
}

impl CrumbCache {
    fn valid(&self) -> Option<&str> {
        let fetched_at = self.fetched_at?;
        if fetched_at.elapsed().as_secs() >= CRUMB_TTL_SECS {
            return None;
        }
        self.crumb.as_deref()
    }
}

/// Yahoo Finance provider supporting real API calls and a deterministic
/// fake mode for offline tests. Mode follows the transport: a mock
/// [`HttpClient`] switches the adapter to fake data.
#[derive(Clone)]
pub struct YahooProvider {
    http_client: Arc<dyn HttpClient>,
    circuit_breaker: Arc<CircuitBreaker>,
    crumb: Arc<Mutex<CrumbCache>>,
    use_real_api: bool,
}

impl Default for YahooProvider {
    fn default() -> Self {
        Self::with_http_client(Arc::new(NoopHttpClient))
    }
}

impl YahooProvider {
    pub fn with_http_client(http_client: Arc<dyn HttpClient>) -> Self {
        let use_real_api = !http_client.is_mock();
        Self {
            http_client,
            circuit_breaker: Arc::new(CircuitBreaker::default()),
            crumb: Arc::new(Mutex::new(CrumbCache::default())),
            use_real_api,
        }
    }

    pub fn with_circuit_breaker(mut self, circuit_breaker: Arc<CircuitBreaker>) -> Self {
        self.circuit_breaker = circuit_breaker;
        self
    }

    pub fn circuit_breaker(&self) -> &Arc<CircuitBreaker> {
        &self.circuit_breaker
    }

    async fn execute_guarded(&self, request: HttpRequest) -> Result<String, ProviderError> {
        if !self.circuit_breaker.allow_request() {
            return Err(ProviderError::unavailable(
                "yahoo circuit breaker is open; skipping upstream call",
            ));
        }

        let response = self.http_client.execute(request).await.map_err(|error| {
            self.circuit_breaker.record_failure();
            if error.retryable() {
                ProviderError::unavailable(format!("yahoo transport error: {}", error.message()))
            } else {
                ProviderError::internal(format!("yahoo transport error: {}", error.message()))
            }
        })?;

        if response.status == 429 {
            self.circuit_breaker.record_failure();
            return Err(ProviderError::rate_limited("yahoo returned status 429"));
        }

        if !response.is_success() {
            self.circuit_breaker.record_failure();
            return Err(ProviderError::unavailable(format!(
                "yahoo upstream returned status {}",
                response.status
            )));
        }

        self.circuit_breaker.record_success();
        Ok(response.body)
    }

    async fn get_crumb(&self) -> Result<String, ProviderError> {
        {
            let cache = self.crumb.lock().expect("crumb cache lock is not poisoned");
            if let Some(crumb) = cache.valid() {
                return Ok(crumb.to_owned());
            }
        }

        // Visiting fc.yahoo.com seeds the session cookie in the jar.
        let cookie_request = HttpRequest::get("https://fc.yahoo.com")
            .with_header("referer", "https://finance.yahoo.com/")
            .with_timeout_ms(10_000);
        let _ = self.http_client.execute(cookie_request).await;

        for endpoint in [
            "https://query1.finance.yahoo.com/v1/test/getcrumb",
            "https://query2.finance.yahoo.com/v1/test/getcrumb",
        ] {
            let request = HttpRequest::get(endpoint)
                .with_header("referer", "https://finance.yahoo.com/")
                .with_timeout_ms(10_000);

            let Ok(response) = self.http_client.execute(request).await else {
                continue;
            };
            if !response.is_success() {
                continue;
            }

            let body = response.body.trim();
            if body.is_empty() || body.len() >= 100 || body.contains(' ') || body.contains('<') {
                continue;
            }

            let mut cache = self.crumb.lock().expect("crumb cache lock is not poisoned");
            cache.crumb = Some(body.to_owned());
            cache.fetched_at = Some(Instant::now());
            return Ok(body.to_owned());
        }

        Err(ProviderError::unavailable(
            "failed to fetch yahoo crumb from all endpoints",
        ))
    }
}

impl QuoteProvider for YahooProvider {
    fn quote<'a>(
        &'a self,
        symbol: &'a Symbol,
    ) -> Pin<Box<dyn Future<Output = Result<QuoteSnapshot, ProviderError>> + Send + 'a>> {
        Box::pin(async move {
            if self.use_real_api {
                self.fetch_real_quote(symbol).await
            } else {
                self.fetch_fake_quote(symbol).await
            }
        })
    }

    fn history<'a>(
        &'a self,
        symbol: &'a Symbol,
        range: DateRange,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<HistoryEntry>, ProviderError>> + Send + 'a>> {
        Box::pin(async move {
            if self.use_real_api {
                self.fetch_real_history(symbol, range).await
            } else {
                self.fetch_fake_history(symbol, range).await
            }
        })
    }
}

// Real API calls.
impl YahooProvider {
    async fn fetch_real_quote(&self, symbol: &Symbol) -> Result<QuoteSnapshot, ProviderError> {
        let crumb = self.get_crumb().await?;
        let endpoint = format!(
            "https://query1.finance.yahoo.com/v7/finance/quote?symbols={}&fields=shortName,regularMarketPrice,regularMarketChange&crumb={}",
            urlencoding::encode(symbol.as_str()),
            urlencoding::encode(&crumb)
        );

        let request = HttpRequest::get(endpoint)
            .with_header("referer", "https://finance.yahoo.com/")
            .with_timeout_ms(10_000);
        let body = self.execute_guarded(request).await?;

        let parsed: YahooQuoteResponse = serde_json::from_str(&body)
            .map_err(|e| ProviderError::internal(format!("failed to parse yahoo quote: {e}")))?;

        if let Some(error) = &parsed.quote_response.error {
            if !error.is_empty() {
                return Err(ProviderError::unavailable(format!(
                    "yahoo API error: {error}"
                )));
            }
        }

        let row = parsed
            .quote_response
            .result
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::not_found(symbol))?;

        let price = row
            .regular_market_price
            .ok_or_else(|| ProviderError::not_found(symbol))?;

        QuoteSnapshot::new(
            symbol.clone(),
            row.short_name.unwrap_or_else(|| row.symbol.clone()),
            price,
            row.regular_market_change.unwrap_or(0.0),
            UtcDateTime::now(),
        )
        .map_err(|e| ProviderError::internal(e.to_string()))
    }

    async fn fetch_real_history(
        &self,
        symbol: &Symbol,
        range: DateRange,
    ) -> Result<Vec<HistoryEntry>, ProviderError> {
        let period1 = range.start().as_date().midnight().assume_utc().unix_timestamp();
        // period2 is exclusive; extend by one day so the closed range end is included.
        let period2 = range
            .end()
            .next()
            .unwrap_or(range.end())
            .as_date()
            .midnight()
            .assume_utc()
            .unix_timestamp();

        let endpoint = format!(
            "https://query1.finance.yahoo.com/v8/finance/chart/{}?period1={}&period2={}&interval=1d",
            urlencoding::encode(symbol.as_str()),
            period1,
            period2
        );

        let request = HttpRequest::get(endpoint)
            .with_header("referer", "https://finance.yahoo.com/")
            .with_timeout_ms(10_000);
        let body = self.execute_guarded(request).await?;

        let parsed: YahooChartResponse = serde_json::from_str(&body)
            .map_err(|e| ProviderError::internal(format!("failed to parse yahoo chart: {e}")))?;

        if let Some(error) = &parsed.chart.error {
            if !error.is_empty() {
                return Err(ProviderError::unavailable(format!(
                    "yahoo chart API error: {error}"
                )));
            }
        }

        let result = parsed
            .chart
            .result
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::not_found(symbol))?;

        let timestamps = result.timestamp.unwrap_or_default();
        let quote = result
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::internal("no quote series in chart response"))?;

        let mut entries = Vec::with_capacity(timestamps.len());
        for (index, ts) in timestamps.iter().enumerate() {
            let ts_offset = time::OffsetDateTime::from_unix_timestamp(*ts)
                .map_err(|e| ProviderError::internal(format!("invalid timestamp: {e}")))?;
            let date = TradingDay::from_date(ts_offset.date());
            if !range.contains(date) {
                continue;
            }

            if let (Some(Some(open)), Some(Some(close)), Some(Some(high)), Some(Some(low))) = (
                quote.open.get(index),
                quote.close.get(index),
                quote.high.get(index),
                quote.low.get(index),
            ) {
                if let Ok(entry) = HistoryEntry::new(date, *open, *close, *high, *low) {
                    entries.push(entry);
                }
            }
        }

        Ok(entries)
    }
}

// Deterministic fake data for tests.
impl YahooProvider {
    async fn fetch_fake_quote(&self, symbol: &Symbol) -> Result<QuoteSnapshot, ProviderError> {
        let request = HttpRequest::get("https://query1.finance.yahoo.com/v7/finance/quote");
        self.execute_guarded(request).await?;

        let seed = symbol_seed(symbol);
        let price = 92.0 + (seed % 500) as f64 / 10.0;
        let change = (seed % 30) as f64 / 10.0 - 1.5;

        QuoteSnapshot::new(
            symbol.clone(),
            fake_company_name(symbol),
            price,
            change,
            UtcDateTime::now(),
        )
        .map_err(|e| ProviderError::internal(e.to_string()))
    }

    async fn fetch_fake_history(
        &self,
        symbol: &Symbol,
        range: DateRange,
    ) -> Result<Vec<HistoryEntry>, ProviderError> {
        let request = HttpRequest::get("https://query1.finance.yahoo.com/v8/finance/chart");
        self.execute_guarded(request).await?;

        let seed = symbol_seed(symbol);
        let mut entries = Vec::new();
        for day in range.days() {
            let ordinal = day.as_date().to_julian_day() as u64;
            let base = 90.0 + ((seed.wrapping_add(ordinal)) % 350) as f64 / 10.0;
            let entry = HistoryEntry::new(day, base, base + 0.30, base + 1.20, base - 0.80)
                .map_err(|e| ProviderError::internal(e.to_string()))?;
            entries.push(entry);
        }

        Ok(entries)
    }
}

// Yahoo Finance API response structures.
#[derive(Debug, Clone, Deserialize)]
struct YahooQuoteResponse {
    #[serde(rename = "quoteResponse")]
    quote_response: YahooQuoteResponseData,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooQuoteResponseData {
    result: Vec<YahooQuoteData>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooQuoteData {
    symbol: String,
    #[serde(rename = "shortName")]
    short_name: Option<String>,
    #[serde(rename = "regularMarketPrice")]
    regular_market_price: Option<f64>,
    #[serde(rename = "regularMarketChange")]
    regular_market_change: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooChartResponse {
    chart: YahooChartData,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooChartData {
    result: Vec<YahooChartResult>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooChartResult {
    timestamp: Option<Vec<i64>>,
    indicators: YahooChartIndicators,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooChartIndicators {
    quote: Vec<YahooChartQuote>,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooChartQuote {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
}

fn fake_company_name(symbol: &Symbol) -> String {
    match symbol.as_str() {
        "AAPL" => String::from("Apple Inc."),
        "MSFT" => String::from("Microsoft Corporation"),
        "GOOG" => String::from("Alphabet Inc."),
        "TSLA" => String::from("Tesla, Inc."),
        other => format!("{other} Holdings"),
    }
}

fn symbol_seed(symbol: &Symbol) -> u64 {
    symbol.as_str().bytes().fold(0_u64, |acc, byte| {
        acc.wrapping_mul(33).wrapping_add(byte as u64)
    })
}
