//! # apiary-network
//!
//! HTTP 네트워크 어댑터.
//! 원격 히스토리 REST API와 통신하는 `HistoryApiClient` 포트 구현을 제공한다.
//! 재시도는 하지 않으며, 실패는 균일한 응답 봉투로 돌려준다.
//!
//! ## 사용 예시
//!
//! ```rust,ignore
//! use apiary_network::http_client::{Endpoint, HttpHistoryClient};
//!
//! let client = HttpHistoryClient::new(
//!     Endpoint::Fixed("http://localhost:3001/api".to_string()),
//!     Duration::from_secs(30),
//! )?;
//! ```

pub mod http_client;
