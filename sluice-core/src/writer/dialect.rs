use crate::{Error, QueryError, Result};
use url::Url;

/// How a mutation sends back values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturningStyle {
    /// `RETURNING ...` after the statement.
    Clause,
    /// `OUTPUT INSERTED.* / DELETED.*` before the values or the condition.
    Output,
    Unsupported,
}

/// How the last inserted id is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LastInsertedIdStyle {
    /// The id column is returned by the insert itself.
    Returning,
    /// The runner reports the id generated by the statement, the ids of a
    /// multi row insert are the consecutive values starting from it.
    Runner,
}

/// How the values before an update are made visible to the returning clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OldValuesStyle {
    /// Self join against a snapshot of the table, aliased `_old_`.
    SnapshotJoin,
    /// `DELETED` pseudo table.
    Deleted,
    Unsupported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitStyle {
    /// `LIMIT n OFFSET m`, the value is the largest limit accepted when only an offset is present.
    LimitOffset { offset_only: Option<&'static str> },
    /// `TOP (n)` or `OFFSET m ROWS FETCH NEXT n ROWS ONLY`.
    TopOffsetFetch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsensitiveStyle {
    ILike,
    Lower,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateFromStyle {
    /// `UPDATE t SET ... FROM other`
    From,
    /// `UPDATE t, other SET t.c = ...`
    MultiTable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteUsingStyle {
    /// `DELETE FROM t USING other`
    Using,
    /// `DELETE t FROM t, other`
    MultiTable,
    /// `DELETE FROM t FROM other`
    From,
    Unsupported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceStyle {
    /// `nextval('s')` / `currval('s')`
    NextVal,
    /// `nextval(s)` / `lastval(s)`
    MariaDb,
    /// `NEXT VALUE FOR s`
    NextValueFor,
    Unsupported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcedureStyle {
    Call,
    Exec,
    Unsupported,
}

/// Fixed capability table of a target database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    pub name: &'static str,
    pub quote: (char, char),
    pub insert_returning: ReturningStyle,
    pub update_returning: ReturningStyle,
    pub delete_returning: ReturningStyle,
    pub last_inserted_id: LastInsertedIdStyle,
    pub old_values: OldValuesStyle,
    pub limit: LimitStyle,
    pub insensitive: InsensitiveStyle,
    pub recursive_keyword: bool,
    pub update_from: UpdateFromStyle,
    pub delete_using: DeleteUsingStyle,
    pub sequences: SequenceStyle,
    pub procedures: ProcedureStyle,
    /// `DEFAULT` accepted inside a multi row `VALUES`.
    pub default_in_values: bool,
    /// `() VALUES ()` instead of `DEFAULT VALUES`.
    pub empty_values: bool,
    /// `WITH` accepted inside a sub-select.
    pub nested_with: bool,
    /// `WITH` written after the column list of an insert from select.
    pub with_inside_insert: bool,
    pub length_function: &'static str,
    pub text_type: &'static str,
}

impl Dialect {
    pub const POSTGRES: Dialect = Dialect {
        name: "postgres",
        quote: ('"', '"'),
        insert_returning: ReturningStyle::Clause,
        update_returning: ReturningStyle::Clause,
        delete_returning: ReturningStyle::Clause,
        last_inserted_id: LastInsertedIdStyle::Returning,
        old_values: OldValuesStyle::SnapshotJoin,
        limit: LimitStyle::LimitOffset { offset_only: None },
        insensitive: InsensitiveStyle::ILike,
        recursive_keyword: true,
        update_from: UpdateFromStyle::From,
        delete_using: DeleteUsingStyle::Using,
        sequences: SequenceStyle::NextVal,
        procedures: ProcedureStyle::Call,
        default_in_values: true,
        empty_values: false,
        nested_with: true,
        with_inside_insert: false,
        length_function: "length",
        text_type: "text",
    };

    pub const MYSQL: Dialect = Dialect {
        name: "mysql",
        quote: ('`', '`'),
        insert_returning: ReturningStyle::Unsupported,
        update_returning: ReturningStyle::Unsupported,
        delete_returning: ReturningStyle::Unsupported,
        last_inserted_id: LastInsertedIdStyle::Runner,
        old_values: OldValuesStyle::Unsupported,
        limit: LimitStyle::LimitOffset {
            offset_only: Some("18446744073709551615"),
        },
        insensitive: InsensitiveStyle::Lower,
        recursive_keyword: true,
        update_from: UpdateFromStyle::MultiTable,
        delete_using: DeleteUsingStyle::MultiTable,
        sequences: SequenceStyle::Unsupported,
        procedures: ProcedureStyle::Call,
        default_in_values: true,
        empty_values: true,
        nested_with: true,
        with_inside_insert: true,
        length_function: "char_length",
        text_type: "char",
    };

    pub const MARIADB: Dialect = Dialect {
        name: "mariadb",
        insert_returning: ReturningStyle::Clause,
        delete_returning: ReturningStyle::Clause,
        last_inserted_id: LastInsertedIdStyle::Returning,
        sequences: SequenceStyle::MariaDb,
        ..Dialect::MYSQL
    };

    pub const SQLITE: Dialect = Dialect {
        name: "sqlite",
        quote: ('"', '"'),
        insert_returning: ReturningStyle::Clause,
        update_returning: ReturningStyle::Clause,
        delete_returning: ReturningStyle::Clause,
        last_inserted_id: LastInsertedIdStyle::Returning,
        old_values: OldValuesStyle::Unsupported,
        limit: LimitStyle::LimitOffset {
            offset_only: Some("-1"),
        },
        insensitive: InsensitiveStyle::Lower,
        recursive_keyword: true,
        update_from: UpdateFromStyle::From,
        delete_using: DeleteUsingStyle::Unsupported,
        sequences: SequenceStyle::Unsupported,
        procedures: ProcedureStyle::Unsupported,
        default_in_values: false,
        empty_values: false,
        nested_with: true,
        with_inside_insert: false,
        length_function: "length",
        text_type: "text",
    };

    pub const SQLSERVER: Dialect = Dialect {
        name: "sqlserver",
        quote: ('[', ']'),
        insert_returning: ReturningStyle::Output,
        update_returning: ReturningStyle::Output,
        delete_returning: ReturningStyle::Output,
        last_inserted_id: LastInsertedIdStyle::Returning,
        old_values: OldValuesStyle::Deleted,
        limit: LimitStyle::TopOffsetFetch,
        insensitive: InsensitiveStyle::Lower,
        recursive_keyword: false,
        update_from: UpdateFromStyle::From,
        delete_using: DeleteUsingStyle::From,
        sequences: SequenceStyle::NextValueFor,
        procedures: ProcedureStyle::Exec,
        default_in_values: true,
        empty_values: false,
        nested_with: false,
        with_inside_insert: false,
        length_function: "len",
        text_type: "nvarchar(max)",
    };

    /// Capability table matching the scheme of a connection url.
    pub fn from_url(url: &str) -> Result<&'static Dialect> {
        let parsed = Url::parse(url).map_err(|e| {
            Error::new(e).context(QueryError::Configuration(format!(
                "Invalid connection url `{url}`"
            )))
        })?;
        match parsed.scheme() {
            "postgres" | "postgresql" => Ok(&Dialect::POSTGRES),
            "mysql" => Ok(&Dialect::MYSQL),
            "mariadb" => Ok(&Dialect::MARIADB),
            "sqlite" => Ok(&Dialect::SQLITE),
            "mssql" | "sqlserver" => Ok(&Dialect::SQLSERVER),
            scheme => Err(QueryError::configuration(format!(
                "No dialect for the scheme `{scheme}`"
            ))),
        }
    }
}
