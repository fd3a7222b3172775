//! 值对象（Value Object）
//!
//! 无标识、以值相等为准的对象。目前只有状态版本号。
//!

use std::fmt;

use horizon_macros::value_object;

/// 状态版本号（乐观并发令牌）
///
/// 新建状态为 0，每应用一个事件加一；存储层以它做条件更新。
///
/// # 示例
///
/// ```
/// use horizon_domain::value_object::Version;
///
/// let v1 = Version::new();
/// assert!(v1.is_new());
///
/// let v2 = v1.next();
/// assert_eq!(v2.value(), 1);
/// assert!(v2 > v1);
/// ```
#[value_object(ord = true)]
pub struct Version(usize);

impl Version {
    /// 初始版本（版本号为 0）
    pub const fn new() -> Self {
        Self(0)
    }

    pub const fn from_value(value: usize) -> Self {
        Self(value)
    }

    /// 获取下一个版本号
    ///
    /// ```
    /// use horizon_domain::value_object::Version;
    ///
    /// assert_eq!(Version::from_value(10).next().value(), 11);
    /// ```
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    pub const fn value(&self) -> usize {
        self.0
    }

    /// 是否为初始版本（尚未应用任何事件）
    pub fn is_new(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl From<usize> for Version {
    fn from(value: usize) -> Self {
        Self::from_value(value)
    }
}

impl From<Version> for usize {
    fn from(version: Version) -> Self {
        version.value()
    }
}
