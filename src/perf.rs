// ==========================================
// 农业作业管理系统 - 命令耗时与 SQL 统计
// ==========================================
// 每条命令一个 PerfGuard：记录耗时、语句数、写语句数、慢语句数
// 开关: AGROTIC_LEDGER_PERF_SQL（默认 debug 构建开启）
// 阈值: AGROTIC_LEDGER_SLOW_SQL_MS（默认 50ms / release 200ms）
// ==========================================

use rusqlite::Connection;
use std::cell::Cell;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

pub const PERF_SQL_ENV: &str = "AGROTIC_LEDGER_PERF_SQL";
pub const SLOW_SQL_MS_ENV: &str = "AGROTIC_LEDGER_SLOW_SQL_MS";

#[derive(Debug, Clone, Copy)]
struct PerfSettings {
    enabled: bool,
    slow_ms: u128,
}

impl PerfSettings {
    fn from_env() -> Self {
        let enabled = std::env::var(PERF_SQL_ENV)
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "on" | "yes"))
            .unwrap_or(cfg!(debug_assertions));
        let slow_ms = std::env::var(SLOW_SQL_MS_ENV)
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(if cfg!(debug_assertions) { 50 } else { 200 });
        Self { enabled, slow_ms }
    }

    fn get() -> Self {
        static SETTINGS: OnceLock<PerfSettings> = OnceLock::new();
        *SETTINGS.get_or_init(Self::from_env)
    }
}

/// 当前线程上命令范围内的累计计数
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct SqlStats {
    statements: u64,
    writes: u64,
    slow: u64,
}

thread_local! {
    static ACTIVE_GUARDS: Cell<u32> = const { Cell::new(0) };
    static STATS: Cell<SqlStats> = const {
        Cell::new(SqlStats { statements: 0, writes: 0, slow: 0 })
    };
}

/// 写台账的语句（INSERT/UPDATE/DELETE）
fn is_write(sql: &str) -> bool {
    let head = sql.trim_start().get(..6).unwrap_or("");
    ["INSERT", "UPDATE", "DELETE"]
        .iter()
        .any(|kw| head.eq_ignore_ascii_case(kw))
}

fn record(sql: &str, duration: Duration, slow_ms: u128) -> bool {
    let slow = duration.as_millis() >= slow_ms;
    if ACTIVE_GUARDS.with(|g| g.get()) > 0 {
        STATS.with(|s| {
            let mut stats = s.get();
            stats.statements += 1;
            stats.writes += u64::from(is_write(sql));
            stats.slow += u64::from(slow);
            s.set(stats);
        });
    }
    slow
}

fn on_profile(sql: &str, duration: Duration) {
    let settings = PerfSettings::get();
    if record(sql, duration, settings.slow_ms) {
        let compact = sql.split_whitespace().collect::<Vec<_>>().join(" ");
        tracing::warn!(
            target: "slow_sql",
            duration_ms = duration.as_millis() as u64,
            sql = %compact,
            "慢 SQL"
        );
    }
}

/// 为连接安装 profile 回调（关闭时不安装）
pub fn install_sqlite_tracing(conn: &mut Connection) {
    if PerfSettings::get().enabled {
        conn.profile(Some(on_profile));
    }
}

/// 命令级统计：drop 时输出一条 perf 日志
///
/// 统计按线程累计；命令在 spawn_blocking 线程上同步执行全部 SQL。
pub struct PerfGuard {
    op: &'static str,
    start: Instant,
    baseline: SqlStats,
}

impl PerfGuard {
    pub fn new(op: &'static str) -> Self {
        ACTIVE_GUARDS.with(|g| g.set(g.get() + 1));
        Self {
            op,
            start: Instant::now(),
            baseline: STATS.with(|s| s.get()),
        }
    }

    fn delta(&self) -> SqlStats {
        let now = STATS.with(|s| s.get());
        SqlStats {
            statements: now.statements - self.baseline.statements,
            writes: now.writes - self.baseline.writes,
            slow: now.slow - self.baseline.slow,
        }
    }
}

impl Drop for PerfGuard {
    fn drop(&mut self) {
        let delta = self.delta();
        tracing::debug!(
            target: "perf",
            op = self.op,
            elapsed_ms = self.start.elapsed().as_millis() as u64,
            statements = delta.statements,
            writes = delta.writes,
            slow = delta.slow,
            "命令完成"
        );
        ACTIVE_GUARDS.with(|g| g.set(g.get().saturating_sub(1)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_statements_detected() {
        assert!(is_write("  update inventory_lot SET reserved_quantity = ?"));
        assert!(is_write("INSERT INTO stock_movement VALUES (?)"));
        assert!(!is_write("SELECT * FROM inventory_lot"));
        assert!(!is_write("BEGIN"));
    }

    #[test]
    fn test_guard_counts_only_inside_scope() {
        record("SELECT 1", Duration::ZERO, 50);

        let guard = PerfGuard::new("test.ledger");
        record("SELECT 1", Duration::ZERO, 50);
        record("UPDATE inventory_lot SET revision = 1", Duration::from_millis(80), 50);
        assert_eq!(
            guard.delta(),
            SqlStats {
                statements: 2,
                writes: 1,
                slow: 1
            }
        );
    }
}
