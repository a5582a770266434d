//! Query Builder SQL generation

use serde_json::Value;

use super::builder::QueryBuilder;

impl QueryBuilder {
    /// Generate SQL with `$n` placeholders and return the parameters in order
    pub fn to_sql_with_params(&self) -> (String, Vec<String>) {
        let mut sql = self.build_select_head();
        let mut params = Vec::new();
        let mut param_counter = 1;

        if !self.where_conditions.is_empty() {
            sql.push_str(" WHERE ");
            for (i, condition) in self.where_conditions.iter().enumerate() {
                if i > 0 {
                    sql.push_str(" AND ");
                }
                sql.push_str(&format!("{} = ${}", condition.column, param_counter));
                params.push(condition.value.to_string());
                param_counter += 1;
            }
        }

        (sql, params)
    }

    /// Convert the query to SQL with values inlined (for logging and tests)
    pub fn to_sql(&self) -> String {
        let mut sql = self.build_select_head();

        if !self.where_conditions.is_empty() {
            sql.push_str(" WHERE ");
            let conditions: Vec<String> = self
                .where_conditions
                .iter()
                .map(|condition| format!("{} = {}", condition.column, self.format_value(&condition.value)))
                .collect();
            sql.push_str(&conditions.join(" AND "));
        }

        sql
    }

    fn build_select_head(&self) -> String {
        let mut sql = String::new();

        if self.distinct {
            sql.push_str("SELECT DISTINCT ");
        } else {
            sql.push_str("SELECT ");
        }

        if self.select_fields.is_empty() {
            sql.push('*');
        } else {
            sql.push_str(&self.select_fields.join(", "));
        }

        if let Some((table, alias)) = &self.from_table {
            sql.push_str(&format!(" FROM {} {}", table, alias));
        }

        for join in &self.joins {
            sql.push_str(&format!(" {} {} {}", join.join_type, join.table, join.alias));
            if !join.on_conditions.is_empty() {
                sql.push_str(" ON ");
                let conditions: Vec<String> = join
                    .on_conditions
                    .iter()
                    .map(|(left, right)| format!("{} = {}", left, right))
                    .collect();
                sql.push_str(&conditions.join(" AND "));
            }
        }

        sql
    }

    /// Format a value for SQL
    pub(crate) fn format_value(&self, value: &Value) -> String {
        match value {
            Value::String(s) => format!("'{}'", s.replace('\'', "''")),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => "NULL".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::types::JoinType;

    fn sample() -> QueryBuilder {
        QueryBuilder::new()
            .select(["user0_.id", "department1_.id"])
            .from("User", "user0_")
            .join_with(
                JoinType::Left,
                "Department",
                "department1_",
                "user0_.department_id",
                "department1_.id",
            )
            .where_eq("user0_.id", 1)
    }

    #[test]
    fn test_select_with_left_join() {
        assert_eq!(
            sample().to_sql(),
            "SELECT user0_.id, department1_.id FROM User user0_ \
             LEFT OUTER JOIN Department department1_ ON user0_.department_id = department1_.id \
             WHERE user0_.id = 1"
        );
    }

    #[test]
    fn test_params_are_numbered() {
        let (sql, params) = sample()
            .distinct()
            .where_eq("department1_.id", 11)
            .to_sql_with_params();
        assert!(sql.starts_with("SELECT DISTINCT "));
        assert!(sql.ends_with("WHERE user0_.id = $1 AND department1_.id = $2"));
        assert_eq!(params, vec!["1", "11"]);
    }

    #[test]
    fn test_inner_join_and_string_escaping() {
        let sql = QueryBuilder::new()
            .from("Company", "company0_")
            .join_with(
                JoinType::Inner,
                "Department",
                "department1_",
                "department1_.company_id",
                "company0_.id",
            )
            .where_eq("company0_.name", "O'Brien")
            .to_sql();
        assert_eq!(
            sql,
            "SELECT * FROM Company company0_ INNER JOIN Department department1_ \
             ON department1_.company_id = company0_.id WHERE company0_.name = 'O''Brien'"
        );
    }
}
