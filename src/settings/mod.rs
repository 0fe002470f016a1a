/// 관리자 설정 캐시
/// 설정 저장소는 외부 관리자 서비스가 소유하며, 본 서비스는 TTL 동안 유효한
/// 읽기 전용 스냅샷으로만 다룬다. get()/invalidate()만 노출하고 전역 상태는 없다.
// region:    --- Imports
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{info, warn};

// endregion: --- Imports

// region:    --- Admin Settings
/// 외부 관리자 서비스가 내려주는 설정 스냅샷
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminSettings {
    /// 종료 임박 판정 기준 (분)
    pub extend_threshold_minutes: i64,
    /// 자동 연장 시간 (분)
    pub auto_extend_minutes: i64,
    /// 신규 등록 강조 표시 시간 (분), UI 전용. 본 서비스는 그대로 전달만 한다
    pub highlight_minutes: i64,
}
// endregion: --- Admin Settings

// region:    --- Settings Source
/// 설정 원본 조회 트레이트
#[async_trait]
pub trait SettingsSource: Send + Sync {
    async fn fetch(&self) -> Result<AdminSettings, String>;
}

/// 관리자 서비스 HTTP 클라이언트
pub struct HttpSettingsSource {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpSettingsSource {
    /// ADMIN_SERVICE_URL 환경 변수로 생성
    pub fn from_env() -> Self {
        let base = std::env::var("ADMIN_SERVICE_URL").expect("ADMIN_SERVICE_URL must be set");
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/admin-settings", base.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl SettingsSource for HttpSettingsSource {
    async fn fetch(&self) -> Result<AdminSettings, String> {
        let response = self
            .client
            .get(&self.endpoint)
            .send()
            .await
            .map_err(|e| e.to_string())?
            .error_for_status()
            .map_err(|e| e.to_string())?;
        response
            .json::<AdminSettings>()
            .await
            .map_err(|e| e.to_string())
    }
}
// endregion: --- Settings Source

// region:    --- Settings Cache
/// TTL 기반 read-through 캐시
pub struct SettingsCache {
    source: Box<dyn SettingsSource>,
    ttl: Duration,
    cached: RwLock<Option<(AdminSettings, Instant)>>,
}

impl SettingsCache {
    pub fn new(source: Box<dyn SettingsSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            cached: RwLock::new(None),
        }
    }

    /// SETTINGS_CACHE_TTL_SECS 환경 변수(기본 60초)로 TTL 결정
    pub fn from_env(source: Box<dyn SettingsSource>) -> Self {
        let ttl_secs = std::env::var("SETTINGS_CACHE_TTL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(60);
        Self::new(source, Duration::from_secs(ttl_secs))
    }

    /// 설정 조회: TTL 안이면 캐시를 그대로 쓰고, 지났으면 원본에서 다시 불러온다.
    /// 갱신에 실패해도 이전 스냅샷이 있으면 경고만 남기고 그 값을 쓴다.
    pub async fn get(&self) -> Result<AdminSettings, String> {
        {
            let guard = self.cached.read().await;
            if let Some((settings, fetched_at)) = *guard {
                if fetched_at.elapsed() < self.ttl {
                    return Ok(settings);
                }
            }
        }

        let mut guard = self.cached.write().await;
        // 쓰기 잠금을 기다리는 동안 다른 작업이 먼저 갱신했을 수 있다.
        if let Some((settings, fetched_at)) = *guard {
            if fetched_at.elapsed() < self.ttl {
                return Ok(settings);
            }
        }

        match self.source.fetch().await {
            Ok(settings) => {
                *guard = Some((settings, Instant::now()));
                info!("{:<12} --> 관리자 설정 갱신: {:?}", "Settings", settings);
                Ok(settings)
            }
            Err(e) => match *guard {
                Some((stale, _)) => {
                    warn!(
                        "{:<12} --> 설정 갱신 실패, 이전 스냅샷 사용: {}",
                        "Settings", e
                    );
                    Ok(stale)
                }
                None => Err(e),
            },
        }
    }

    /// 캐시 무효화: 다음 get()이 원본을 다시 조회한다.
    pub async fn invalidate(&self) {
        *self.cached.write().await = None;
    }
}
// endregion: --- Settings Cache

// region:    --- Gate Policy
/// 평판 게이트 정책
/// 즉시 구매 경매에는 항상 적용하고, 일반 경매 확대 여부는 운영 설정으로 결정한다.
#[derive(Debug, Clone, Copy)]
pub struct GatePolicy {
    /// 요구 긍정 평가 비율 (rating_positive / rating_count)
    pub min_positive_ratio: f64,
    /// 일반(비즉시구매) 경매에도 게이트 적용 여부
    pub applies_to_standard_auctions: bool,
}

impl GatePolicy {
    pub fn from_env() -> Self {
        let min_positive_ratio = std::env::var("REPUTATION_GATE_RATIO")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0.8);
        let applies_to_standard_auctions = std::env::var("REPUTATION_GATE_ALL_AUCTIONS")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);
        Self {
            min_positive_ratio,
            applies_to_standard_auctions,
        }
    }

    /// 이 경매에 게이트를 적용해야 하는지
    pub fn applies_to(&self, is_instant_purchase: bool) -> bool {
        is_instant_purchase || self.applies_to_standard_auctions
    }
}
// endregion: --- Gate Policy

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    fn sample() -> AdminSettings {
        AdminSettings {
            extend_threshold_minutes: 5,
            auto_extend_minutes: 10,
            highlight_minutes: 60,
        }
    }

    /// 호출 횟수를 세고 실패를 흉내 낼 수 있는 테스트 원본
    struct CountingSource {
        calls: Arc<AtomicUsize>,
        fail: Arc<AtomicBool>,
    }

    #[async_trait]
    impl SettingsSource for CountingSource {
        async fn fetch(&self) -> Result<AdminSettings, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                Err("관리자 서비스 연결 실패".to_string())
            } else {
                Ok(sample())
            }
        }
    }

    fn counting_cache(ttl: Duration) -> (SettingsCache, Arc<AtomicUsize>, Arc<AtomicBool>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let fail = Arc::new(AtomicBool::new(false));
        let cache = SettingsCache::new(
            Box::new(CountingSource {
                calls: Arc::clone(&calls),
                fail: Arc::clone(&fail),
            }),
            ttl,
        );
        (cache, calls, fail)
    }

    #[tokio::test]
    async fn get_reuses_snapshot_within_ttl() {
        let (cache, calls, _) = counting_cache(Duration::from_secs(60));

        assert_eq!(cache.get().await.unwrap(), sample());
        assert_eq!(cache.get().await.unwrap(), sample());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn get_refetches_after_ttl() {
        let (cache, calls, _) = counting_cache(Duration::from_millis(20));

        cache.get().await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        cache.get().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn invalidate_forces_refetch() {
        let (cache, calls, _) = counting_cache(Duration::from_secs(60));

        cache.get().await.unwrap();
        cache.invalidate().await;
        cache.get().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn stale_snapshot_served_when_refresh_fails() {
        let (cache, calls, fail) = counting_cache(Duration::from_millis(10));

        assert_eq!(cache.get().await.unwrap(), sample());
        fail.store(true, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(30)).await;

        // 갱신은 실패하지만 이전 스냅샷을 돌려준다.
        assert_eq!(cache.get().await.unwrap(), sample());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn cold_cache_with_failing_source_errors() {
        let (cache, _, fail) = counting_cache(Duration::from_secs(60));
        fail.store(true, Ordering::SeqCst);

        assert!(cache.get().await.is_err());
    }

    #[test]
    fn gate_applies_to_instant_purchase_always() {
        let gate = GatePolicy {
            min_positive_ratio: 0.8,
            applies_to_standard_auctions: false,
        };
        assert!(gate.applies_to(true));
        assert!(!gate.applies_to(false));

        let widened = GatePolicy {
            applies_to_standard_auctions: true,
            ..gate
        };
        assert!(widened.applies_to(false));
    }

    #[test]
    fn admin_settings_wire_format_is_camel_case() {
        let parsed: AdminSettings = serde_json::from_str(
            r#"{"extendThresholdMinutes":5,"autoExtendMinutes":10,"highlightMinutes":60}"#,
        )
        .unwrap();
        assert_eq!(parsed, sample());
    }
}
