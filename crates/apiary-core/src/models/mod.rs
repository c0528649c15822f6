//! 도메인 모델.
//!
//! - `history`: 요청 히스토리 항목과 부분 업데이트
//! - `storage`: 저장소 종류, 영속 저장소 설정, 마이그레이션 단계
//! - `backup`: 백업 스냅샷, 내보내기 봉투
//! - `report`: 통계, 상태 점검, 연결 상태, 마이그레이션 결과

pub mod backup;
pub mod history;
pub mod report;
pub mod storage;
