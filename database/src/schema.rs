//! Column layout shared by the `jobreport` and `rejected` tables.

use derive_more::derive::Display;
use itertools::Itertools as _;

pub const JOB_ID: &str = "JobID";
pub const START: &str = "Start";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Table {
    #[display("jobreport")]
    JobReport,
    /// Same columns as [`Table::JobReport`], meant for records failing validation. Nothing writes
    /// to it yet, see [`crate::Store::reject`].
    #[display("rejected")]
    Rejected,
}

impl Table {
    pub const ALL: [Table; 2] = [Table::JobReport, Table::Rejected];

    pub fn name(&self) -> &'static str {
        match self {
            Table::JobReport => "jobreport",
            Table::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    /// Fixed width, enforced with a `CHECK` since SQLite ignores the declared length.
    String(usize),
    Integer,
    BigInteger,
    Float,
    DateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub ty: SqlType,
}

const fn col(name: &'static str, ty: SqlType) -> Column {
    Column { name, ty }
}

/// Bind order of [`crate::Store`] statements. `JobID` must stay first.
pub const COLUMNS: [Column; 22] = [
    col(JOB_ID, SqlType::String(20)),
    col("User", SqlType::String(50)),
    col("JobName", SqlType::String(255)),
    col("State", SqlType::String(20)),
    col("Partition", SqlType::String(255)),
    col("NCPUS", SqlType::Integer),
    col("NNodes", SqlType::Integer),
    col("CPUTime", SqlType::Float),
    col("TotalCPU", SqlType::Float),
    col("UserCPU", SqlType::Float),
    col("SystemCPU", SqlType::Float),
    col("MaxRSS_kB", SqlType::BigInteger),
    col("ReqMem_bytes_per_node", SqlType::BigInteger),
    col("ReqMem_bytes_per_core", SqlType::BigInteger),
    col("ReqMem_bytes", SqlType::BigInteger),
    col(START, SqlType::DateTime),
    col("End", SqlType::DateTime),
    col("NodeList", SqlType::String(255)),
    col("ReqMem_bytes_total", SqlType::BigInteger),
    col("CPU_Efficiency", SqlType::Float),
    col("CPU_Wasted", SqlType::Float),
    col("CancelledBy", SqlType::String(20)),
];

fn quote(name: &str) -> String {
    format!("\"{name}\"")
}

fn column_definition(column: &Column) -> String {
    let name = quote(column.name);
    match (column.name, column.ty) {
        (JOB_ID, SqlType::String(width)) => {
            format!("{name} VARCHAR({width}) NOT NULL UNIQUE CHECK (length({name}) BETWEEN 1 AND {width})")
        }
        (_, SqlType::String(width)) => format!("{name} VARCHAR({width}) CHECK (length({name}) <= {width})"),
        (_, SqlType::Integer) => format!("{name} INTEGER"),
        (_, SqlType::BigInteger) => format!("{name} BIGINT"),
        (_, SqlType::Float) => format!("{name} FLOAT"),
        (_, SqlType::DateTime) => format!("{name} DATETIME"),
    }
}

pub fn create_table_sql(table: Table) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (\n    {columns}\n)",
        table = quote(table.name()),
        columns = COLUMNS.iter().map(column_definition).join(",\n    "),
    )
}

pub fn drop_table_sql(table: Table) -> String {
    format!("DROP TABLE IF EXISTS {}", quote(table.name()))
}

pub fn insert_sql(table: Table) -> String {
    format!(
        "INSERT INTO {table} ({columns}) VALUES ({placeholders})",
        table = quote(table.name()),
        columns = COLUMNS.iter().map(|c| quote(c.name)).join(", "),
        placeholders = (1..=COLUMNS.len()).map(|i| format!("?{i}")).join(", "),
    )
}

/// Matches on `?1` (`JobID`), the other placeholders line up with [`insert_sql`].
pub fn update_sql(table: Table) -> String {
    format!(
        "UPDATE {table} SET {assignments} WHERE {job_id} = ?1",
        table = quote(table.name()),
        assignments = COLUMNS
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, c)| format!("{} = ?{}", quote(c.name), i + 1))
            .join(", "),
        job_id = quote(JOB_ID),
    )
}

#[allow(non_snake_case)]
#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn Table__display_matches_name() {
        for table in Table::ALL {
            assert_eq!(table.to_string(), table.name());
        }
    }

    #[test]
    fn create_table_sql__job_id_unique_and_checked() {
        let sql = create_table_sql(Table::JobReport);
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS \"jobreport\""));
        assert!(sql.contains("\"JobID\" VARCHAR(20) NOT NULL UNIQUE CHECK (length(\"JobID\") BETWEEN 1 AND 20)"));
        assert!(sql.contains("\"End\" DATETIME"));
        assert_eq!(sql.matches(" UNIQUE").count(), 1);
    }

    #[test]
    fn insert_sql__binds_every_column() {
        let sql = insert_sql(Table::Rejected);
        assert!(sql.starts_with("INSERT INTO \"rejected\" (\"JobID\", \"User\""));
        assert!(sql.ends_with("?21, ?22)"));
    }

    #[test]
    fn update_sql__keeps_job_id() {
        let sql = update_sql(Table::JobReport);
        assert!(sql.starts_with("UPDATE \"jobreport\" SET \"User\" = ?2, "));
        assert!(sql.ends_with("\"CancelledBy\" = ?22 WHERE \"JobID\" = ?1"));
        assert!(!sql.contains("\"JobID\" = ?2"));
    }
}
