//! 저장소 구현.
//!
//! `simrs_core`의 저장소 trait를 PostgreSQL(sqlx)과 인메모리로 구현합니다.
//! 라우트 핸들러는 구체 타입이 아닌 trait 객체만 사용합니다.

pub mod memory;
pub mod permissions;
pub mod sessions;
pub mod users;

pub use memory::MemoryStore;
pub use permissions::PermissionRepository;
pub use sessions::SessionRepository;
pub use users::UserRepository;
