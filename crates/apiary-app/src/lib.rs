//! # apiary-app
//!
//! 히스토리 저장소 앱 레이어.
//! 저장소 설정, 저장소 파사드, UI용 히스토리 캐시와 의존성 구성을 담당한다.
//!
//! ## 모듈
//! - `config_store`: 활성 백엔드 선택과 가용성 캐시 영속화
//! - `storage_interface`: 활성 어댑터 라우팅, 전환, 마이그레이션
//! - `history_store`: UI용 히스토리 캐시
//! - `context`: 어댑터 생성 및 컨텍스트 구성

pub mod config_store;
pub mod context;
pub mod history_store;
pub mod storage_interface;
