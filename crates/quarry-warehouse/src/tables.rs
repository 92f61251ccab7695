//! Table definitions shared by schema setup and inserts.
//!
//! Column types stick to names both PostgreSQL and SQLite accept, and
//! placeholders use `$N`, which both drivers parse. Timestamps are stored as
//! RFC 3339 UTC text.

use quarry_core::SourceKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Double,
    BigInt,
}

impl ColumnType {
    pub const fn sql(self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Double => "DOUBLE PRECISION",
            Self::BigInt => "BIGINT",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub name: &'static str,
    pub column_type: ColumnType,
    pub not_null: bool,
    pub check: Option<&'static str>,
}

impl Column {
    const fn new(name: &'static str, column_type: ColumnType) -> Self {
        Self {
            name,
            column_type,
            not_null: false,
            check: None,
        }
    }

    const fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    const fn check(mut self, expr: &'static str) -> Self {
        self.check = Some(expr);
        self
    }
}

/// One warehouse table: columns plus the unique key that makes inserts
/// idempotent. An empty key means append-only.
#[derive(Debug, Clone)]
pub struct TableSpec {
    pub name: &'static str,
    pub columns: Vec<Column>,
    pub key_columns: Vec<&'static str>,
}

impl TableSpec {
    pub fn for_source(source: SourceKind) -> Self {
        match source {
            SourceKind::Stock => Self::stock_quotes(),
            SourceKind::Weather => Self::weather_readings(),
        }
    }

    pub fn all() -> Vec<Self> {
        vec![
            Self::stock_quotes(),
            Self::weather_readings(),
            Self::scrape_runs(),
        ]
    }

    pub fn stock_quotes() -> Self {
        Self {
            name: "stock_quotes",
            columns: vec![
                Column::new("symbol", ColumnType::Text).not_null(),
                Column::new("price", ColumnType::Double)
                    .not_null()
                    .check("price > 0"),
                Column::new("change", ColumnType::Double),
                Column::new("change_percent", ColumnType::Double),
                Column::new("volume", ColumnType::BigInt),
                Column::new("scrape_url", ColumnType::Text),
                Column::new("fetched_at", ColumnType::Text).not_null(),
            ],
            key_columns: vec!["symbol", "fetched_at"],
        }
    }

    pub fn weather_readings() -> Self {
        Self {
            name: "weather_readings",
            columns: vec![
                Column::new("city_id", ColumnType::BigInt).not_null(),
                Column::new("city_name", ColumnType::Text).not_null(),
                Column::new("temperature", ColumnType::Double)
                    .not_null()
                    .check("temperature BETWEEN -100 AND 100"),
                Column::new("feels_like", ColumnType::Double),
                Column::new("humidity", ColumnType::Double),
                Column::new("pressure", ColumnType::Double),
                Column::new("wind_speed", ColumnType::Double),
                Column::new("wind_direction", ColumnType::BigInt),
                Column::new("cloudiness", ColumnType::Double),
                Column::new("weather_condition", ColumnType::Text),
                Column::new("weather_description", ColumnType::Text),
                Column::new("fetched_at", ColumnType::Text).not_null(),
            ],
            key_columns: vec!["city_id", "fetched_at"],
        }
    }

    /// Append-only audit trail, one row per scraper cycle.
    pub fn scrape_runs() -> Self {
        Self {
            name: "scrape_runs",
            columns: vec![
                Column::new("source", ColumnType::Text).not_null(),
                Column::new("started_at", ColumnType::Text).not_null(),
                Column::new("finished_at", ColumnType::Text).not_null(),
                Column::new("status", ColumnType::Text).not_null(),
                Column::new("fetched", ColumnType::BigInt).not_null(),
                Column::new("stored", ColumnType::BigInt).not_null(),
                Column::new("rejected", ColumnType::BigInt).not_null(),
                Column::new("duplicates", ColumnType::BigInt).not_null(),
                Column::new("failures", ColumnType::BigInt).not_null(),
                Column::new("detail", ColumnType::Text),
            ],
            key_columns: Vec::new(),
        }
    }

    pub fn create_sql(&self) -> String {
        let mut defs: Vec<String> = self
            .columns
            .iter()
            .map(|column| {
                let mut def = format!("{} {}", column.name, column.column_type.sql());
                if column.not_null {
                    def.push_str(" NOT NULL");
                }
                if let Some(expr) = column.check {
                    def.push_str(&format!(" CHECK ({expr})"));
                }
                def
            })
            .collect();
        if !self.key_columns.is_empty() {
            defs.push(format!("UNIQUE ({})", self.key_columns.join(", ")));
        }
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
            self.name,
            defs.join(",\n    ")
        )
    }

    pub fn insert_sql(&self) -> String {
        let names: Vec<&str> = self.columns.iter().map(|c| c.name).collect();
        let placeholders: Vec<String> = (1..=names.len()).map(|n| format!("${n}")).collect();
        let mut sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.name,
            names.join(", "),
            placeholders.join(", ")
        );
        if !self.key_columns.is_empty() {
            sql.push_str(&format!(
                " ON CONFLICT ({}) DO NOTHING",
                self.key_columns.join(", ")
            ));
        }
        sql
    }
}
