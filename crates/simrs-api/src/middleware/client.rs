//! 클라이언트 정보 추출.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRef, FromRequestParts},
    http::{header::USER_AGENT, request::Parts, Extensions, HeaderMap},
};

/// 주소를 알 수 없을 때 사용하는 값.
pub const UNKNOWN_CLIENT: &str = "unknown";

const MAX_DEVICE_INFO_LEN: usize = 255;

/// 클라이언트 주소 결정 정책.
///
/// 기본값은 프록시 헤더를 무시하고 소켓의 원격 주소만 사용합니다.
/// X-Forwarded-For, X-Real-IP는 클라이언트가 임의로 보낼 수 있으므로
/// 신뢰할 수 있는 리버스 프록시 뒤에서만 켜야 합니다
/// (`server.trust_forwarded_headers`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientAddrPolicy {
    trust_forwarded_headers: bool,
}

impl ClientAddrPolicy {
    pub const fn new(trust_forwarded_headers: bool) -> Self {
        Self {
            trust_forwarded_headers,
        }
    }

    pub const fn trusts_forwarded_headers(&self) -> bool {
        self.trust_forwarded_headers
    }

    /// 요청에서 클라이언트 IP 추출.
    ///
    /// 헤더를 신뢰하면 X-Forwarded-For의 첫 항목, X-Real-IP 순서로 확인합니다.
    /// 그 외에는 `ConnectInfo`의 원격 주소, 그것도 없으면 [`UNKNOWN_CLIENT`].
    pub fn client_ip(&self, headers: &HeaderMap, extensions: &Extensions) -> String {
        if self.trust_forwarded_headers {
            if let Some(ip) = forwarded_ip(headers) {
                return ip;
            }
        }

        extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
    }
}

fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    if let Some(forwarded_for) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        // 첫 번째 IP가 클라이언트 원본 IP
        if let Some(ip) = forwarded_for.split(',').next().map(str::trim) {
            if !ip.is_empty() {
                return Some(ip.to_string());
            }
        }
    }

    headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
}

/// 핸들러용 클라이언트 정보 (주소, 기기 설명).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub addr: Option<String>,
    pub device: Option<String>,
}

impl<S> FromRequestParts<S> for ClientInfo
where
    S: Send + Sync,
    ClientAddrPolicy: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let addr = ClientAddrPolicy::from_ref(state).client_ip(&parts.headers, &parts.extensions);
        let device = parts
            .headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(|ua| ua.chars().take(MAX_DEVICE_INFO_LEN).collect());

        Ok(Self {
            addr: (addr != UNKNOWN_CLIENT).then_some(addr),
            device,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn proxied_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9, 10.0.0.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        headers
    }

    fn connected_from(ip: [u8; 4]) -> Extensions {
        let mut extensions = Extensions::new();
        extensions.insert(ConnectInfo(SocketAddr::from((ip, 40000))));
        extensions
    }

    #[test]
    fn test_forwarded_for_wins_when_trusted() {
        let policy = ClientAddrPolicy::new(true);
        assert_eq!(
            policy.client_ip(&proxied_headers(), &connected_from([10, 0, 0, 1])),
            "203.0.113.9"
        );

        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static(" 10.0.0.2 "));
        assert_eq!(policy.client_ip(&headers, &Extensions::new()), "10.0.0.2");
    }

    #[test]
    fn test_forwarded_headers_ignored_by_default() {
        let policy = ClientAddrPolicy::default();
        assert!(!policy.trusts_forwarded_headers());

        assert_eq!(
            policy.client_ip(&proxied_headers(), &connected_from([192, 168, 1, 7])),
            "192.168.1.7"
        );
        assert_eq!(policy.client_ip(&proxied_headers(), &Extensions::new()), UNKNOWN_CLIENT);
    }

    #[test]
    fn test_connect_info_fallback() {
        let policy = ClientAddrPolicy::new(true);
        assert_eq!(
            policy.client_ip(&HeaderMap::new(), &connected_from([192, 168, 1, 7])),
            "192.168.1.7"
        );
        assert_eq!(policy.client_ip(&HeaderMap::new(), &Extensions::new()), UNKNOWN_CLIENT);
    }

    #[tokio::test]
    async fn test_client_info_uses_state_policy() {
        let request = axum::http::Request::builder()
            .header("x-forwarded-for", "203.0.113.9")
            .header(USER_AGENT, "Firefox")
            .body(())
            .unwrap();
        let (mut parts, _) = request.into_parts();
        parts.extensions.insert(ConnectInfo(SocketAddr::from(([10, 0, 0, 5], 40000))));

        let direct = ClientInfo::from_request_parts(&mut parts, &ClientAddrPolicy::default())
            .await
            .unwrap();
        assert_eq!(direct.addr.as_deref(), Some("10.0.0.5"));
        assert_eq!(direct.device.as_deref(), Some("Firefox"));

        let proxied = ClientInfo::from_request_parts(&mut parts, &ClientAddrPolicy::new(true))
            .await
            .unwrap();
        assert_eq!(proxied.addr.as_deref(), Some("203.0.113.9"));
    }
}
