mod resource {
    pub mod runner;
    pub mod schema;
}

#[cfg(test)]
mod tests {
    use crate::resource::schema::{company, employee};
    use indoc::indoc;
    use sluice::{
        DefaultTypeAdapter, ErrorKind, PostgresSqlWriter, QueryError, Result, SqlServerSqlWriter,
        TypeAdapter, Value, count_all, fields, select_from,
    };
    use std::{fmt::Debug, sync::Arc};

    fn assert_configuration<T: Debug>(result: Result<T>) {
        let error = result.expect_err("A configuration error was expected");
        assert_eq!(
            QueryError::kind_of(&error),
            Some(ErrorKind::Configuration),
            "{error:#}"
        );
    }

    #[test]
    fn named_query() {
        let company = company();
        let roots = select_from(&company)
            .select(fields! { "id" => company.col("id"), "name" => company.col("name") })
            .filter(company.col("parentId").is_null())
            .as_cte("roots");
        let query = select_from(&roots)
            .select(fields! { "name" => roots.col("name") })
            .order_by("name");
        assert_eq!(
            query.sql(&PostgresSqlWriter::new()).unwrap(),
            indoc! {r#"
                WITH "roots" AS (SELECT "company"."id" AS "id", "company"."name" AS "name"
                FROM "company"
                WHERE "company"."parent_id" IS NULL)
                SELECT "roots"."name" AS "name"
                FROM "roots"
                ORDER BY "name" ASC
            "#}
            .trim()
        );
    }

    #[test]
    fn dependencies_are_written_first() {
        let company = company();
        let employee = employee();
        let roots = select_from(&company)
            .select(fields! { "id" => company.col("id"), "name" => company.col("name") })
            .filter(company.col("parentId").is_null())
            .as_cte("roots");
        let staff = select_from(&employee)
            .select(fields! {
                "companyId" => employee.col("companyId"),
                "headcount" => count_all(),
            })
            .group_by(["companyId"])
            .as_cte("staff");
        let report = select_from(&roots)
            .join(&staff, staff.col("companyId").equals(roots.col("id")))
            .select(fields! {
                "name" => roots.col("name"),
                "headcount" => staff.col("headcount"),
            })
            .as_cte("report");
        let query = select_from(&report).select(fields! {
            "name" => report.col("name"),
            "headcount" => report.col("headcount"),
        });
        assert_eq!(
            query.sql(&PostgresSqlWriter::new()).unwrap(),
            indoc! {r#"
                WITH "roots" AS (SELECT "company"."id" AS "id", "company"."name" AS "name"
                FROM "company"
                WHERE "company"."parent_id" IS NULL),
                "staff" AS (SELECT "employee"."company_id" AS "companyId", count(*) AS "headcount"
                FROM "employee"
                GROUP BY "employee"."company_id"),
                "report" AS (SELECT "roots"."name" AS "name", "staff"."headcount" AS "headcount"
                FROM "roots"
                JOIN "staff" ON "staff"."companyId" = "roots"."id")
                SELECT "report"."name" AS "name", "report"."headcount" AS "headcount"
                FROM "report"
            "#}
            .trim()
        );
    }

    #[test]
    fn same_query_read_twice() {
        let company = company();
        let roots = select_from(&company)
            .select(fields! { "id" => company.col("id"), "name" => company.col("name") })
            .filter(company.col("parentId").is_null())
            .as_cte("roots");
        let other = roots.aliased("other");
        let query = select_from(&roots)
            .join(&other, other.col("id").not_equals(roots.col("id")))
            .select(fields! { "left" => roots.col("name"), "right" => other.col("name") });
        let sql = query.sql(&PostgresSqlWriter::new()).unwrap();
        assert_eq!(sql.matches("WITH").count(), 1);
        assert!(sql.ends_with(indoc! {r#"
            SELECT "roots"."name" AS "left", "other"."name" AS "right"
            FROM "roots"
            JOIN "roots" AS "other" ON "other"."id" <> "roots"."id""#}));
    }

    #[test]
    fn query_used_by_a_sub_select_is_hoisted() {
        let company = company();
        let employee = employee();
        let roots = select_from(&company)
            .select(fields! { "id" => company.col("id") })
            .filter(company.col("parentId").is_null())
            .as_cte("roots");
        let query = select_from(&employee)
            .select(fields! { "name" => employee.col("name") })
            .filter(
                employee
                    .col("companyId")
                    .in_select(&select_from(&roots).select_one_column(roots.col("id"))),
            );
        assert_eq!(
            query.sql(&PostgresSqlWriter::new()).unwrap(),
            indoc! {r#"
                WITH "roots" AS (SELECT "company"."id" AS "id"
                FROM "company"
                WHERE "company"."parent_id" IS NULL)
                SELECT "employee"."name" AS "name"
                FROM "employee"
                WHERE "employee"."company_id" IN (SELECT "roots"."id" AS "result"
                FROM "roots")
            "#}
            .trim()
        );
    }

    #[test]
    fn two_queries_with_the_same_name() {
        let company = company();
        let ids = select_from(&company)
            .select(fields! { "id" => company.col("id") })
            .as_cte("named");
        let names = select_from(&company)
            .select(fields! { "name" => company.col("name") })
            .as_cte("named");
        let query = select_from(&ids)
            .cross_join(&names)
            .select(fields! { "id" => ids.col("id"), "name" => names.col("name") });
        assert_configuration(query.sql(&PostgresSqlWriter::new()));
        assert_configuration(
            select_from(&ids)
                .select(fields! { "missing" => ids.col("name") })
                .sql(&PostgresSqlWriter::new()),
        );
    }

    #[test]
    fn recursive_descendants() {
        let company = company();
        let tree = select_from(&company)
            .select(fields! {
                "id" => company.col("id"),
                "name" => company.col("name"),
                "parentId" => company.col("parentId"),
            })
            .filter(company.col("id").equals(1))
            .order_by("name")
            .recursive_union_all_on(|r| company.col("parentId").equals(r.col("id")));
        let adapter: Arc<dyn TypeAdapter> = Arc::new(DefaultTypeAdapter);
        let compiled = tree.compile(&PostgresSqlWriter::new(), &adapter).unwrap();
        assert_eq!(
            compiled.sql,
            indoc! {r#"
                WITH RECURSIVE "recursive_select_1" AS (SELECT "company"."id" AS "id", "company"."name" AS "name", "company"."parent_id" AS "parentId"
                FROM "company"
                WHERE "company"."id" = $1
                UNION ALL
                SELECT "company"."id" AS "id", "company"."name" AS "name", "company"."parent_id" AS "parentId"
                FROM "company"
                INNER JOIN "recursive_select_1" ON "company"."parent_id" = "recursive_select_1"."id")
                SELECT "recursive_select_1"."id" AS "id", "recursive_select_1"."name" AS "name", "recursive_select_1"."parentId" AS "parentId"
                FROM "recursive_select_1"
                ORDER BY "name" ASC
            "#}
            .trim()
        );
        assert_eq!(compiled.params, [Value::Int32(Some(1))]);

        assert!(
            tree.sql(&SqlServerSqlWriter::new())
                .unwrap()
                .starts_with("WITH [recursive_select_1] AS (SELECT [company].[id] AS [id]")
        );

        let count = tree.compile_count(&PostgresSqlWriter::new(), &adapter).unwrap();
        assert!(count.sql.starts_with("WITH RECURSIVE \"recursive_select_1\" AS (SELECT "));
        assert!(count.sql.ends_with(indoc! {r#"
            SELECT count(*) AS "result"
            FROM (SELECT "recursive_select_1"."id" AS "id", "recursive_select_1"."name" AS "name", "recursive_select_1"."parentId" AS "parentId"
            FROM "recursive_select_1") AS "_count_""#}));
    }

    #[test]
    fn recursive_ancestry_with_explicit_term() {
        let company = company();
        let ancestry = select_from(&company)
            .select(fields! {
                "id" => company.col("id"),
                "name" => company.col("name"),
                "parentId" => company.col("parentId"),
            })
            .filter(company.col("name").equals("Low"))
            .recursive_union_all(|r| {
                select_from(&company)
                    .join(r, company.col("id").equals(r.col("parentId")))
                    .select(fields! {
                        "id" => company.col("id"),
                        "name" => company.col("name"),
                        "parentId" => company.col("parentId"),
                    })
            });
        let sql = ancestry.sql(&PostgresSqlWriter::new()).unwrap();
        assert!(sql.contains(indoc! {r#"
            UNION ALL
            SELECT "company"."id" AS "id", "company"."name" AS "name", "company"."parent_id" AS "parentId"
            FROM "company"
            JOIN "recursive_select_1" ON "company"."id" = "recursive_select_1"."parentId")
        "#}));
    }

    #[test]
    fn recursive_term_must_read_itself_once() {
        let company = company();
        let base = || {
            select_from(&company).select(fields! {
                "id" => company.col("id"),
                "parentId" => company.col("parentId"),
            })
        };
        let never = base().recursive_union_all(|_| base());
        assert_configuration(never.sql(&PostgresSqlWriter::new()));

        let twice = base().recursive_union_all(|r| {
            select_from(r)
                .join(r, r.col("id").equals(r.col("parentId")))
                .select(fields! { "id" => r.col("id"), "parentId" => r.col("parentId") })
        });
        assert_configuration(twice.sql(&PostgresSqlWriter::new()));

        let narrower = base().recursive_union_all(|r| {
            select_from(&company)
                .join(r, company.col("parentId").equals(r.col("id")))
                .select(fields! { "id" => company.col("id") })
        });
        assert_configuration(narrower.sql(&PostgresSqlWriter::new()));
    }

    #[test]
    fn recursive_select_nested_in_another_query() {
        let company = company();
        let child = company.aliased("child");
        let subtree = select_from(&child)
            .select(fields! { "id" => child.col("id"), "name" => child.col("name") })
            .filter(child.col("parentId").equals(company.col("id")))
            .recursive_union_all_on(|r| child.col("parentId").equals(r.col("id")));
        let query = select_from(&company).select(fields! {
            "name" => company.col("name"),
            "descendants" => subtree.as_inline_aggregated_array(),
        });
        assert!(
            query
                .sql(&PostgresSqlWriter::new())
                .unwrap()
                .contains(" FROM (WITH RECURSIVE \"recursive_select_1\" AS (SELECT ")
        );
        assert_configuration(query.sql(&SqlServerSqlWriter::new()));
    }
}
