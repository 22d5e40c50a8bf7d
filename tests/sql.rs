mod resource {
    pub mod runner;
    pub mod schema;
}

#[cfg(test)]
mod tests {
    use crate::resource::schema::{company, employee, invoice};
    use indoc::indoc;
    use rust_decimal::Decimal;
    use sluice::{
        Compiled, DataType, DefaultTypeAdapter, ErrorKind, Expr, Field, MySqlSqlWriter, PostgresSqlWriter,
        QueryError, Result, SelectQuery, Sequence, SqlServerSqlWriter, SqlWriter, SqliteSqlWriter,
        TypeAdapter, Value, aggregate_as_array, aggregate_as_array_of_one_column, call, count_all,
        exists, fields, not_exists, select_from, select_from_no_table, sum, writer_for_url,
    };
    use std::{fmt::Debug, sync::Arc};

    fn compile<P>(query: &SelectQuery<P>, writer: &dyn SqlWriter) -> Compiled {
        let adapter: Arc<dyn TypeAdapter> = Arc::new(DefaultTypeAdapter);
        query.compile(writer, &adapter).expect("The query should compile")
    }

    fn assert_configuration<T: Debug>(result: Result<T>) {
        let error = result.expect_err("A configuration error was expected");
        assert_eq!(
            QueryError::kind_of(&error),
            Some(ErrorKind::Configuration),
            "{error:#}"
        );
    }

    #[test]
    fn filtered_page_per_dialect() {
        let company = company();
        let query = select_from(&company)
            .select(fields! { "id" => company.col("id"), "name" => company.col("name") })
            .filter(
                company
                    .col("name")
                    .starts_with("AC")
                    .and(company.col("parentId").is_null()),
            )
            .order_by("name")
            .limit(10)
            .offset(20);

        let compiled = compile(&query, &PostgresSqlWriter::new());
        assert_eq!(
            compiled.sql,
            indoc! {r#"
                SELECT "company"."id" AS "id", "company"."name" AS "name"
                FROM "company"
                WHERE "company"."name" LIKE $1 ESCAPE '!' AND "company"."parent_id" IS NULL
                ORDER BY "name" ASC
                LIMIT 10
                OFFSET 20
            "#}
            .trim()
        );
        assert_eq!(compiled.params, [Value::Varchar(Some("AC%".into()))]);

        assert_eq!(
            query.sql(&MySqlSqlWriter::new()).unwrap(),
            indoc! {r#"
                SELECT `company`.`id` AS `id`, `company`.`name` AS `name`
                FROM `company`
                WHERE `company`.`name` LIKE ? ESCAPE '!' AND `company`.`parent_id` IS NULL
                ORDER BY `name` ASC
                LIMIT 10
                OFFSET 20
            "#}
            .trim()
        );

        assert_eq!(
            query.sql(&SqlServerSqlWriter::new()).unwrap(),
            indoc! {r#"
                SELECT [company].[id] AS [id], [company].[name] AS [name]
                FROM [company]
                WHERE [company].[name] LIKE @P1 ESCAPE '!' AND [company].[parent_id] IS NULL
                ORDER BY [name] ASC
                OFFSET 20 ROWS
                FETCH NEXT 10 ROWS ONLY
            "#}
            .trim()
        );
    }

    #[test]
    fn offset_without_limit() {
        let company = company();
        let query = select_from(&company)
            .select(fields! { "name" => company.col("name") })
            .offset(5);
        assert_eq!(
            query.sql(&PostgresSqlWriter::new()).unwrap(),
            "SELECT \"company\".\"name\" AS \"name\"\nFROM \"company\"\nOFFSET 5"
        );
        assert_eq!(
            query.sql(&SqliteSqlWriter::new()).unwrap(),
            "SELECT \"company\".\"name\" AS \"name\"\nFROM \"company\"\nLIMIT -1\nOFFSET 5"
        );
        assert_eq!(
            query.sql(&MySqlSqlWriter::new()).unwrap(),
            "SELECT `company`.`name` AS `name`\nFROM `company`\nLIMIT 18446744073709551615\nOFFSET 5"
        );
        assert_eq!(
            query.sql(&SqlServerSqlWriter::new()).unwrap(),
            indoc! {r#"
                SELECT [company].[name] AS [name]
                FROM [company]
                ORDER BY (SELECT NULL)
                OFFSET 5 ROWS
            "#}
            .trim()
        );
    }

    #[test]
    fn sqlserver_top_and_bits() {
        let company = company();
        let query = select_from(&company)
            .select(fields! {
                "name" => company.col("name"),
                "isRoot" => company.col("parentId").is_null(),
            })
            .filter(company.col("id").greater_than(3))
            .limit(3);
        assert_eq!(
            query.sql(&SqlServerSqlWriter::new()).unwrap(),
            indoc! {r#"
                SELECT TOP (3) [company].[name] AS [name], CASE WHEN [company].[parent_id] IS NULL THEN 1 ELSE 0 END AS [isRoot]
                FROM [company]
                WHERE [company].[id] > @P1
            "#}
            .trim()
        );
        assert_eq!(
            query.sql(&PostgresSqlWriter::new()).unwrap(),
            indoc! {r#"
                SELECT "company"."name" AS "name", "company"."parent_id" IS NULL AS "isRoot"
                FROM "company"
                WHERE "company"."id" > $1
                LIMIT 3
            "#}
            .trim()
        );
    }

    #[test]
    fn like_patterns() {
        let company = company();
        let employee = employee();

        let escaped = select_from(&company)
            .select(fields! { "id" => company.col("id") })
            .filter(company.col("name").contains("a_b%"));
        let compiled = compile(&escaped, &PostgresSqlWriter::new());
        assert!(compiled.sql.ends_with("WHERE \"company\".\"name\" LIKE $1 ESCAPE '!'"));
        assert_eq!(compiled.params, [Value::Varchar(Some("%a!_b!%%".into()))]);
        let compiled = compile(
            &select_from(&company)
                .select(fields! { "id" => company.col("id") })
                .filter(company.col("name").contains("[x]")),
            &SqlServerSqlWriter::new(),
        );
        assert_eq!(compiled.params, [Value::Varchar(Some("%![x]%".into()))]);

        let insensitive = select_from(&company)
            .select(fields! { "id" => company.col("id") })
            .filter(company.col("name").ends_with_insensitive("corp"));
        let compiled = compile(&insensitive, &PostgresSqlWriter::new());
        assert!(compiled.sql.ends_with("WHERE \"company\".\"name\" ILIKE $1 ESCAPE '!'"));
        assert_eq!(compiled.params, [Value::Varchar(Some("%corp".into()))]);
        assert!(
            insensitive
                .sql(&SqliteSqlWriter::new())
                .unwrap()
                .ends_with("WHERE lower(\"company\".\"name\") LIKE lower(?) ESCAPE '!'")
        );

        let columns = select_from(&employee)
            .join(&company, employee.col("companyId").equals(company.col("id")))
            .select(fields! { "id" => employee.col("id") })
            .filter(employee.col("name").starts_with(company.col("name")));
        let compiled = compile(&columns, &PostgresSqlWriter::new());
        assert!(
            compiled
                .sql
                .ends_with("WHERE \"employee\".\"name\" LIKE \"company\".\"name\" || '%'")
        );
        assert!(compiled.params.is_empty());
        assert!(
            columns
                .sql(&MySqlSqlWriter::new())
                .unwrap()
                .ends_with("WHERE `employee`.`name` LIKE concat(`company`.`name`, '%')")
        );
    }

    #[test]
    fn string_functions() {
        let company = company();
        let query = select_from(&company)
            .select(fields! {
                "shout" => company.col("name").upper(),
                "size" => company.col("name").length(),
                "parent" => company.col("parentId").as_string().value_when_null("none"),
            })
            .filter(
                company
                    .col("name")
                    .equals_insensitive("acme")
                    .or(company.col("name").contains_insensitive("corp")),
            );
        let compiled = compile(&query, &PostgresSqlWriter::new());
        assert_eq!(
            compiled.sql,
            indoc! {r#"
                SELECT upper("company"."name") AS "shout", length("company"."name") AS "size", coalesce(CAST("company"."parent_id" AS text), $1) AS "parent"
                FROM "company"
                WHERE lower("company"."name") = lower($2) OR "company"."name" ILIKE $3 ESCAPE '!'
            "#}
            .trim()
        );
        assert_eq!(
            compiled.params,
            [
                Value::Varchar(Some("none".into())),
                Value::Varchar(Some("acme".into())),
                Value::Varchar(Some("%corp%".into())),
            ]
        );
        assert!(query.sql(&SqliteSqlWriter::new()).unwrap().ends_with(
            "WHERE lower(\"company\".\"name\") = lower(?) OR lower(\"company\".\"name\") LIKE lower(?) ESCAPE '!'"
        ));
        assert!(query.sql(&MySqlSqlWriter::new()).unwrap().starts_with(
            "SELECT upper(`company`.`name`) AS `shout`, char_length(`company`.`name`) AS `size`, coalesce(CAST(`company`.`parent_id` AS char), ?) AS `parent`"
        ));
        assert!(query.sql(&SqlServerSqlWriter::new()).unwrap().starts_with(
            "SELECT upper([company].[name]) AS [shout], len([company].[name]) AS [size], coalesce(CAST([company].[parent_id] AS nvarchar(max)), @P1) AS [parent]"
        ));
    }

    #[test]
    fn in_lists() {
        let company = company();
        let base = || select_from(&company).select(fields! { "name" => company.col("name") });

        let compiled = compile(
            &base().filter(company.col("id").in_values([1, 2])),
            &PostgresSqlWriter::new(),
        );
        assert!(compiled.sql.ends_with("WHERE \"company\".\"id\" IN ($1, $2)"));
        assert_eq!(
            compiled.params,
            [Value::Int32(Some(1)), Value::Int32(Some(2))]
        );

        let empty = base().filter(company.col("id").in_values(Vec::<i32>::new()));
        assert!(empty.sql(&PostgresSqlWriter::new()).unwrap().ends_with("WHERE FALSE"));
        assert!(empty.sql(&SqlServerSqlWriter::new()).unwrap().ends_with("WHERE 1 = 0"));
        let negated = base().filter(company.col("id").not_in_values(Vec::<i32>::new()));
        assert!(negated.sql(&PostgresSqlWriter::new()).unwrap().ends_with("WHERE TRUE"));
        assert!(negated.sql(&SqlServerSqlWriter::new()).unwrap().ends_with("WHERE 1 = 1"));
    }

    #[test]
    fn operator_precedence() {
        let company = company();
        let query = select_from(&company)
            .select(fields! { "id" => company.col("id") })
            .filter(
                company
                    .col("id")
                    .equals(1)
                    .or(company.col("id").equals(2))
                    .and(company.col("name").equals("ACME")),
            )
            .or_filter(!company.col("name").equals("x").and(company.col("parentId").is_null()));
        let compiled = compile(&query, &PostgresSqlWriter::new());
        assert_eq!(
            compiled.sql,
            indoc! {r#"
                SELECT "company"."id" AS "id"
                FROM "company"
                WHERE ("company"."id" = $1 OR "company"."id" = $2) AND "company"."name" = $3 OR NOT ("company"."name" = $4 AND "company"."parent_id" IS NULL)
            "#}
            .trim()
        );
        assert_eq!(
            compiled.params,
            [
                Value::Int32(Some(1)),
                Value::Int32(Some(2)),
                Value::Varchar(Some("ACME".into())),
                Value::Varchar(Some("x".into())),
            ]
        );
    }

    #[test]
    fn concatenation_per_dialect() {
        let company = company();
        let query = select_from(&company).select(fields! {
            "label" => company.col("name").concat(" Inc"),
        });
        assert_eq!(
            query.sql(&PostgresSqlWriter::new()).unwrap(),
            "SELECT \"company\".\"name\" || $1 AS \"label\"\nFROM \"company\""
        );
        assert_eq!(
            query.sql(&MySqlSqlWriter::new()).unwrap(),
            "SELECT concat(`company`.`name`, ?) AS `label`\nFROM `company`"
        );
        assert_eq!(
            query.sql(&SqlServerSqlWriter::new()).unwrap(),
            "SELECT [company].[name] + @P1 AS [label]\nFROM [company]"
        );
    }

    #[test]
    fn joins() {
        let company = company();
        let employee = employee();
        let parent = company.aliased("parent").for_use_in_left_join();
        let query = select_from(&employee)
            .join(&company, employee.col("companyId").equals(company.col("id")))
            .left_join(&parent, company.col("parentId").equals(parent.col("id")))
            .select(fields! {
                "employee" => employee.col("name"),
                "company" => company.col("name"),
                "parent" => parent.col("name"),
            });
        assert_eq!(
            query.sql(&PostgresSqlWriter::new()).unwrap(),
            indoc! {r#"
                SELECT "employee"."name" AS "employee", "company"."name" AS "company", "parent"."name" AS "parent"
                FROM "employee"
                JOIN "company" ON "employee"."company_id" = "company"."id"
                LEFT JOIN "company" AS "parent" ON "company"."parent_id" = "parent"."id"
            "#}
            .trim()
        );
        assert!(parent.col("name").is_nullable());
        assert!(!company.col("name").is_nullable());

        let outer = select_from(&employee)
            .right_join(&company, employee.col("companyId").equals(company.col("id")))
            .full_join(&parent, company.col("parentId").equals(parent.col("id")))
            .select(fields! { "company" => company.col("name") });
        assert!(outer.sql(&PostgresSqlWriter::new()).unwrap().ends_with(indoc! {r#"
            RIGHT JOIN "company" ON "employee"."company_id" = "company"."id"
            FULL JOIN "company" AS "parent" ON "company"."parent_id" = "parent"."id"
        "#}.trim()));
    }

    #[test]
    fn grouping() {
        let employee = employee();
        let query = select_from(&employee)
            .select(fields! {
                "companyId" => employee.col("companyId"),
                "headcount" => count_all(),
                "payroll" => sum(&employee.col("salary")),
            })
            .group_by(["companyId"])
            .having(count_all().greater_than(5))
            .order_by_desc("payroll");
        let compiled = compile(&query, &PostgresSqlWriter::new());
        assert_eq!(
            compiled.sql,
            indoc! {r#"
                SELECT "employee"."company_id" AS "companyId", count(*) AS "headcount", sum("employee"."salary") AS "payroll"
                FROM "employee"
                GROUP BY "employee"."company_id"
                HAVING count(*) > $1
                ORDER BY "payroll" DESC
            "#}
            .trim()
        );
        assert_eq!(compiled.params, [Value::Int64(Some(5))]);
    }

    #[test]
    fn aggregated_arrays() {
        let company = company();
        let child = company.aliased("child").for_use_in_left_join();
        let grouped = select_from(&company)
            .left_join(&child, child.col("parentId").equals(company.col("id")))
            .select(fields! {
                "id" => company.col("id"),
                "children" => aggregate_as_array(fields! { "name" => child.col("name") }),
            })
            .group_by(["id"]);
        assert_eq!(
            grouped.sql(&PostgresSqlWriter::new()).unwrap(),
            indoc! {r#"
                SELECT "company"."id" AS "id", json_agg(json_build_object('name', "child"."name")) AS "children"
                FROM "company"
                LEFT JOIN "company" AS "child" ON "child"."parent_id" = "company"."id"
                GROUP BY "company"."id"
            "#}
            .trim()
        );

        let names = select_from(&company)
            .left_join(&child, child.col("parentId").equals(company.col("id")))
            .select(fields! {
                "id" => company.col("id"),
                "names" => aggregate_as_array_of_one_column(&child.col("name")),
            })
            .group_by(["id"]);
        assert!(names.sql(&PostgresSqlWriter::new()).unwrap().starts_with(
            "SELECT \"company\".\"id\" AS \"id\", json_agg(\"child\".\"name\") AS \"names\""
        ));

        let child = company.aliased("child");
        let children = select_from(&child)
            .select(fields! { "name" => child.col("name") })
            .filter(child.col("parentId").equals(company.col("id")))
            .order_by("name");
        let inline = select_from(&company).select(fields! {
            "id" => company.col("id"),
            "children" => children.as_inline_aggregated_array(),
        });
        assert_eq!(
            inline.sql(&PostgresSqlWriter::new()).unwrap(),
            indoc! {r#"
                SELECT "company"."id" AS "id", (SELECT json_agg(json_build_object('name', "_agg_1"."name")) FROM (SELECT "child"."name" AS "name"
                FROM "company" AS "child"
                WHERE "child"."parent_id" = "company"."id"
                ORDER BY "name" ASC) AS "_agg_1") AS "children"
                FROM "company"
            "#}
            .trim()
        );
        assert!(
            inline
                .sql(&SqliteSqlWriter::new())
                .unwrap()
                .starts_with("SELECT \"company\".\"id\" AS \"id\", (SELECT json_group_array(json_object('name', \"_agg_1\".\"name\")) FROM (")
        );
    }

    #[test]
    fn sub_selects() {
        let company = company();
        let employee = employee();
        let wealthy = select_from(&employee)
            .select_one_column(employee.col("companyId"))
            .filter(employee.col("salary").greater_than(Decimal::new(100_000, 0)));
        let query = select_from(&company)
            .select(fields! { "name" => company.col("name") })
            .filter(company.col("id").in_select(&wealthy));
        let compiled = compile(&query, &PostgresSqlWriter::new());
        assert_eq!(
            compiled.sql,
            indoc! {r#"
                SELECT "company"."name" AS "name"
                FROM "company"
                WHERE "company"."id" IN (SELECT "employee"."company_id" AS "result"
                FROM "employee"
                WHERE "employee"."salary" > $1)
            "#}
            .trim()
        );
        assert_eq!(
            compiled.params,
            [Value::Decimal(Some(Decimal::new(100_000, 0)))]
        );

        let staffed = select_from(&company)
            .select(fields! { "name" => company.col("name") })
            .filter(exists(
                &select_from(&employee)
                    .select_one_column(employee.col("id"))
                    .filter(employee.col("companyId").equals(company.col("id"))),
            ));
        assert_eq!(
            staffed.sql(&PostgresSqlWriter::new()).unwrap(),
            indoc! {r#"
                SELECT "company"."name" AS "name"
                FROM "company"
                WHERE EXISTS (SELECT "employee"."id" AS "result"
                FROM "employee"
                WHERE "employee"."company_id" = "company"."id")
            "#}
            .trim()
        );

        let idle = select_from(&company)
            .select(fields! { "name" => company.col("name") })
            .filter(not_exists(
                &select_from(&employee)
                    .select_one_column(employee.col("id"))
                    .filter(employee.col("companyId").equals(company.col("id"))),
            ));
        assert!(idle.sql(&PostgresSqlWriter::new()).unwrap().contains(
            "WHERE NOT EXISTS (SELECT \"employee\".\"id\" AS \"result\"\nFROM \"employee\""
        ));

        let headcount = select_from(&employee)
            .select_one_column(count_all())
            .filter(employee.col("companyId").equals(company.col("id")));
        let query = select_from(&company).select(fields! {
            "name" => company.col("name"),
            "headcount" => headcount.as_inline_value(),
        });
        assert_eq!(
            query.sql(&PostgresSqlWriter::new()).unwrap(),
            indoc! {r#"
                SELECT "company"."name" AS "name", (SELECT count(*) AS "result"
                FROM "employee"
                WHERE "employee"."company_id" = "company"."id") AS "headcount"
                FROM "company"
            "#}
            .trim()
        );
    }

    #[test]
    fn compound_selects() {
        let company = company();
        let employee = employee();
        let names = select_from(&company)
            .select(fields! { "name" => company.col("name") })
            .filter(company.col("parentId").is_null())
            .union(
                select_from(&employee)
                    .select(fields! { "name" => employee.col("name") })
                    .filter(employee.col("salary").greater_than(Decimal::new(5_000, 0))),
            )
            .order_by("name")
            .limit(5);
        let compiled = compile(&names, &PostgresSqlWriter::new());
        assert_eq!(
            compiled.sql,
            indoc! {r#"
                SELECT "company"."name" AS "name"
                FROM "company"
                WHERE "company"."parent_id" IS NULL
                UNION
                SELECT "employee"."name" AS "name"
                FROM "employee"
                WHERE "employee"."salary" > $1
                ORDER BY "name" ASC
                LIMIT 5
            "#}
            .trim()
        );
        assert_eq!(compiled.params, [Value::Decimal(Some(Decimal::new(5_000, 0)))]);
        assert_eq!(
            names.sql(&SqlServerSqlWriter::new()).unwrap(),
            indoc! {r#"
                SELECT [company].[name] AS [name]
                FROM [company]
                WHERE [company].[parent_id] IS NULL
                UNION
                SELECT [employee].[name] AS [name]
                FROM [employee]
                WHERE [employee].[salary] > @P1
                ORDER BY [name] ASC
                OFFSET 0 ROWS
                FETCH NEXT 5 ROWS ONLY
            "#}
            .trim()
        );

        let unstaffed = select_from(&company)
            .select(fields! { "id" => company.col("id") })
            .except(select_from(&employee).select(fields! { "id" => employee.col("companyId") }))
            .intersect(
                select_from(&company)
                    .select(fields! { "id" => company.col("id") })
                    .filter(company.col("name").starts_with("A")),
            );
        assert_eq!(
            unstaffed.sql(&SqliteSqlWriter::new()).unwrap(),
            indoc! {r#"
                SELECT "company"."id" AS "id"
                FROM "company"
                EXCEPT
                SELECT "employee"."company_id" AS "id"
                FROM "employee"
                INTERSECT
                SELECT "company"."id" AS "id"
                FROM "company"
                WHERE "company"."name" LIKE ? ESCAPE '!'
            "#}
            .trim()
        );

        let every_name = select_from(&company)
            .select_one_column(company.col("name"))
            .union_all(select_from(&employee).select_one_column(employee.col("name")));
        assert_eq!(
            every_name.sql(&MySqlSqlWriter::new()).unwrap(),
            indoc! {r#"
                SELECT `company`.`name` AS `result`
                FROM `company`
                UNION ALL
                SELECT `employee`.`name` AS `result`
                FROM `employee`
            "#}
            .trim()
        );
        let adapter: Arc<dyn TypeAdapter> = Arc::new(DefaultTypeAdapter);
        assert_eq!(
            every_name
                .compile_count(&PostgresSqlWriter::new(), &adapter)
                .unwrap()
                .sql,
            indoc! {r#"
                SELECT count(*) AS "result"
                FROM (SELECT "company"."name" AS "result"
                FROM "company"
                UNION ALL
                SELECT "employee"."name" AS "result"
                FROM "employee") AS "_count_"
            "#}
            .trim()
        );
    }

    #[test]
    fn invalid_compound_selects() {
        let company = company();
        let employee = employee();
        let mismatched = select_from(&company)
            .select(fields! { "name" => company.col("name") })
            .union(select_from(&employee).select(fields! { "fullName" => employee.col("name") }));
        assert_configuration(mismatched.sql(&PostgresSqlWriter::new()));

        let ordered_member = select_from(&company)
            .select(fields! { "name" => company.col("name") })
            .union(
                select_from(&employee)
                    .select(fields! { "name" => employee.col("name") })
                    .order_by("name"),
            );
        assert_configuration(ordered_member.sql(&PostgresSqlWriter::new()));

        let nested = select_from(&company)
            .select(fields! { "name" => company.col("name") })
            .union(
                select_from(&employee)
                    .select(fields! { "name" => employee.col("name") })
                    .intersect(select_from(&employee).select(fields! { "name" => employee.col("name") })),
            );
        assert_configuration(nested.sql(&SqliteSqlWriter::new()));
    }

    #[test]
    fn without_table() {
        let query = select_from_no_table().select(fields! {
            "now" => call("now", Vec::<Expr>::new(), DataType::LocalDateTime),
        });
        assert_eq!(
            query.sql(&PostgresSqlWriter::new()).unwrap(),
            "SELECT now() AS \"now\""
        );
    }

    #[test]
    fn sequences_per_dialect() {
        let sequence = Sequence::new("invoice_seq", DataType::BigInt);
        let query = select_from_no_table().select_one_column(sequence.next_value());
        assert_eq!(
            query.sql(&PostgresSqlWriter::new()).unwrap(),
            "SELECT nextval('invoice_seq') AS \"result\""
        );
        assert_eq!(
            query.sql(&MySqlSqlWriter::mariadb()).unwrap(),
            "SELECT NEXTVAL(`invoice_seq`) AS `result`"
        );
        assert_eq!(
            query.sql(&SqlServerSqlWriter::new()).unwrap(),
            "SELECT NEXT VALUE FOR [invoice_seq] AS [result]"
        );
        assert_configuration(query.sql(&SqliteSqlWriter::new()));
        assert_configuration(query.sql(&MySqlSqlWriter::new()));
        let current = select_from_no_table().select_one_column(sequence.current_value());
        assert_eq!(
            current.sql(&PostgresSqlWriter::new()).unwrap(),
            "SELECT currval('invoice_seq') AS \"result\""
        );
        assert_eq!(
            current.sql(&MySqlSqlWriter::mariadb()).unwrap(),
            "SELECT LASTVAL(`invoice_seq`) AS `result`"
        );
        assert_eq!(
            current.sql(&SqlServerSqlWriter::new()).unwrap(),
            "SELECT (SELECT current_value FROM sys.sequences WHERE name = 'invoice_seq') AS [result]"
        );
    }

    #[test]
    fn schema_qualified_columns() {
        let invoice = invoice();
        let query = select_from(&invoice).select(fields! {
            "total" => invoice.col("total"),
            "totalText" => invoice.col("totalText"),
        });
        assert_eq!(
            query.sql(&PostgresSqlWriter::new()).unwrap(),
            indoc! {r#"
                SELECT "billing"."invoice"."total" AS "total", "billing"."invoice"."total" AS "totalText"
                FROM "billing"."invoice"
            "#}
            .trim()
        );
    }

    #[test]
    fn compiling_twice_gives_the_same_statement() {
        let company = company();
        let query = select_from(&company)
            .select(fields! { "name" => company.col("name") })
            .filter(company.col("id").in_values([1, 2, 3]));
        let postgres = PostgresSqlWriter::new();
        let first = compile(&query, &postgres);
        let second = compile(&query, &postgres);
        assert_eq!(first, second);
        let mysql = compile(&query, &MySqlSqlWriter::new());
        assert_ne!(first.sql, mysql.sql);
        assert_eq!(first.params, mysql.params);
        assert_eq!(compile(&query, &postgres), first);
    }

    #[test]
    fn invalid_selects() {
        let company = company();
        let employee = employee();
        let writer = PostgresSqlWriter::new();

        assert_configuration(
            select_from(&company)
                .select(fields! { "name" => company.col("missing") })
                .sql(&writer),
        );
        assert_configuration(
            select_from(&company)
                .select(fields! { "name" => company.col("name"), "name" => company.col("id") })
                .sql(&writer),
        );
        assert_configuration(
            select_from(&company)
                .select(fields! { "name" => company.col("name") })
                .order_by("id")
                .sql(&writer),
        );
        assert_configuration(
            select_from(&employee)
                .select(fields! { "companyId" => employee.col("companyId"), "total" => count_all() })
                .sql(&writer),
        );
        assert_configuration(
            select_from(&employee)
                .select(fields! { "companyId" => employee.col("companyId"), "total" => count_all() })
                .group_by(["name"])
                .sql(&writer),
        );
        assert_configuration(
            select_from(&employee)
                .select(fields! { "total" => count_all() })
                .filter(count_all().greater_than(1))
                .sql(&writer),
        );
        assert_configuration(select_from(&company).select(Vec::<Field>::new()).sql(&writer));
    }

    #[test]
    fn writer_from_connection_url() {
        let company = company();
        let query = select_from(&company).select(fields! { "id" => company.col("id") });
        let rendered = |url: &str| query.sql(&*writer_for_url(url).unwrap()).unwrap();
        assert!(rendered("postgres://localhost/db").starts_with("SELECT \"company\".\"id\""));
        assert!(rendered("mariadb://localhost/db").starts_with("SELECT `company`.`id`"));
        assert!(rendered("mssql://localhost").starts_with("SELECT [company].[id]"));
        assert!(matches!(
            writer_for_url("oracle://localhost").map(|_| ()),
            Err(e) if QueryError::kind_of(&e) == Some(ErrorKind::Configuration)
        ));
    }
}
