//! Typed queries over the join-fetch query language

use std::collections::{BTreeSet, HashMap};
use std::marker::PhantomData;

use tracing::debug;

use super::parser::ParsedQuery;
use crate::error::{ModelError, ModelResult};
use crate::loading::QueryPlan;
use crate::model::{EntityId, Model};
use crate::session::Session;

/// A parsed query returning entities of type `M`
pub struct TypedQuery<'s, M> {
    session: &'s Session,
    text: String,
    query: ParsedQuery,
    parameters: HashMap<String, EntityId>,
    _marker: PhantomData<fn() -> M>,
}

impl<'s, M> std::fmt::Debug for TypedQuery<'s, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedQuery")
            .field("text", &self.text)
            .field("parameters", &self.parameters)
            .finish()
    }
}

impl<'s, M: Model> TypedQuery<'s, M> {
    pub(crate) fn new(session: &'s Session, text: &str) -> ModelResult<Self> {
        let query = ParsedQuery::parse(text)?;
        if query.entity != M::entity_name() {
            return Err(ModelError::Query(format!(
                "Query selects '{}' but a {} result was requested",
                query.entity,
                M::entity_name()
            )));
        }
        if !session.database().registry().contains(&query.entity) {
            return Err(ModelError::Query(format!(
                "Unknown entity '{}' in query",
                query.entity
            )));
        }
        debug!("Created query: {}", text);
        Ok(Self {
            session,
            text: text.to_string(),
            query,
            parameters: HashMap::new(),
            _marker: PhantomData,
        })
    }

    /// Bind a named parameter
    pub fn set_parameter(mut self, name: &str, value: EntityId) -> ModelResult<Self> {
        if !self.query.parameter_names().contains(&name) {
            return Err(ModelError::Query(format!(
                "Query has no parameter named ':{}'",
                name
            )));
        }
        self.parameters.insert(name.to_string(), value);
        Ok(self)
    }

    /// The query text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Plan the query with the current bindings
    pub fn plan(&self) -> ModelResult<QueryPlan> {
        self.session.planner().plan_query(&self.query, &self.parameters)
    }

    /// Every result row. Without `distinct` a root appears once per joined row.
    pub async fn get_result_list(&self) -> ModelResult<Vec<M>> {
        let plan = self.plan()?;
        self.session
            .execute(&plan)
            .await?
            .into_iter()
            .map(|root| root.into_model::<M>())
            .collect()
    }

    /// Exactly one entity. Repeated rows of the same identity count as one.
    pub async fn get_single_result(&self) -> ModelResult<M> {
        let mut results = self.get_result_list().await?;
        let Some(first) = results.first() else {
            return Err(ModelError::NoResult(format!(
                "'{}' matched no {}",
                self.text,
                M::entity_name()
            )));
        };

        let first_id = first.id();
        if results.iter().any(|r| r.id() != first_id) {
            let count = results.iter().map(Model::id).collect::<BTreeSet<_>>().len();
            return Err(ModelError::NonUniqueResult { count });
        }
        Ok(results.swap_remove(0))
    }
}
