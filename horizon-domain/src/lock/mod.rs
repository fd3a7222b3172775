//! 分布式租约锁（lock）
//!
//! 基于任意支持“不存在才创建”的 CRUD 存储实现跨进程互斥：
//! - `try_acquire`：插入锁行；若 id 已被占用则读取现有行，已过期则视为获得（尽力回收）；
//!   获得后启动租约计时器，到期自动释放；
//! - `wait_acquire`：约每 200ms 轮询一次直至获得；
//! - `release`：幂等，仅在持有时删除锁行；
//! - `LockFactory::release_all`：释放本进程仍持有的全部锁（停机时调用）。
//!
//! 注意：没有 fencing token。过期回收时旧持有者若仍在写入，其写入可能覆盖新持有者，
//! 持有者必须在租约内完成工作；状态行另有乐观版本校验兜底。
//!
mod distributed_lock;

pub use distributed_lock::{DEFAULT_POLL_INTERVAL, DistributedLock, Lock, LockFactory};
