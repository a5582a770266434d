//! Fixed Dataset Builder
//!
//! Two companies, three departments and one user, written in a single unit
//! of work:
//!
//! ```text
//! Company 1 <── Department 11 <── User 1.department
//! Company 2 <── Department 21 <─┬ User 1.related_departments
//!           <── Department 22 <─┘
//! ```

use graphfetch_orm::{Database, EntityId, Model, ModelResult, Session, Transaction};
use tracing::info;

use crate::entities::{Company, Department, User};
use crate::error::{VerifierError, VerifierResult};

pub const USER_ID: EntityId = 1;

/// The entities of the fixed dataset, as persisted
#[derive(Debug, Clone, PartialEq)]
pub struct FixedDataset {
    pub companies: Vec<Company>,
    pub departments: Vec<Department>,
    pub users: Vec<User>,
}

impl FixedDataset {
    /// Build the dataset without persisting it
    pub fn build() -> Self {
        let c1 = Company::new(1);
        let c2 = Company::new(2);
        let d11 = Department::new(11, &c1);
        let d21 = Department::new(21, &c2);
        let d22 = Department::new(22, &c2);
        let user = User::new(USER_ID, &d11, [d21.clone(), d22.clone()]);

        Self {
            companies: vec![c1, c2],
            departments: vec![d11, d21, d22],
            users: vec![user],
        }
    }

    /// Build and persist the dataset atomically. Any failure is a setup failure
    /// and leaves no rows behind.
    pub async fn persist(database: &Database) -> VerifierResult<Self> {
        let dataset = Self::build();
        let session = database.create_session().map_err(VerifierError::SetupFailure)?;
        let result = dataset.write(&session).await;
        session.close();
        result.map_err(VerifierError::SetupFailure)?;

        info!(
            "Fixed dataset persisted: {} companies, {} departments, {} users",
            dataset.companies.len(),
            dataset.departments.len(),
            dataset.users.len()
        );
        Ok(dataset)
    }

    async fn write(&self, session: &Session) -> ModelResult<()> {
        let mut tx = session.begin()?;
        persist_all(&mut tx, &self.companies)?;
        persist_all(&mut tx, &self.departments)?;
        persist_all(&mut tx, &self.users)?;
        tx.commit().await
    }

    /// Ids of the departments in `users[0].related_departments`
    pub fn related_department_ids(&self) -> Vec<EntityId> {
        self.users
            .first()
            .and_then(|u| u.related_departments.ids())
            .unwrap_or_default()
    }
}

fn persist_all<M: Model>(tx: &mut Transaction<'_>, entities: &[M]) -> ModelResult<()> {
    for entity in entities {
        tx.persist(entity)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_matches_fixed_layout() {
        let dataset = FixedDataset::build();
        assert_eq!(dataset.companies.iter().map(|c| c.id).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(
            dataset
                .departments
                .iter()
                .map(|d| (d.id, d.company.id()))
                .collect::<Vec<_>>(),
            vec![(11, 1), (21, 2), (22, 2)]
        );
        assert_eq!(dataset.users[0].department.id(), 11);
        assert_eq!(dataset.related_department_ids(), vec![21, 22]);
    }
}
