#![allow(dead_code, unused_imports)]

pub use dockhand_test_utils::builders;
pub use dockhand_test_utils::fake_engine;
pub use dockhand_test_utils::{init_tracing, test_manager, test_runner, test_user, with_timeout};
