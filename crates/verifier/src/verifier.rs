//! Fetch-Plan Verifier
//!
//! Loads User 1 of the fixed dataset under a fetch plan (or a join-fetch
//! query) and reports which associations came back materialized.

use graphfetch_orm::{Database, EntityGraph, EntityId, FindOptions, OrmConfig, Session};
use tracing::debug;

use crate::dataset::{FixedDataset, USER_ID};
use crate::entities::{register_entities, User, COMPANY, DEPARTMENT, RELATED_DEPARTMENTS};
use crate::error::{VerifierError, VerifierResult};
use crate::report::{strip_member_ids, LoadReport};

/// Join-fetch query covering both branches of the User graph
pub const JOIN_FETCH_QUERY: &str = "select distinct u from User u \
     join fetch u.department d join fetch d.company \
     join fetch u.related_departments rd join fetch rd.company \
     where u.id = :id";

#[derive(Debug, Clone)]
pub struct FetchPlanVerifier {
    database: Database,
}

impl FetchPlanVerifier {
    /// Wrap a database that already holds the fixed dataset
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Fresh in-memory database with the entities registered and the fixed
    /// dataset persisted
    pub async fn setup(config: OrmConfig) -> VerifierResult<Self> {
        let database = Database::in_memory(config).map_err(VerifierError::SetupFailure)?;
        register_entities(&database).map_err(VerifierError::SetupFailure)?;
        FixedDataset::persist(&database).await?;
        Ok(Self::new(database))
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Find a User under `plan` with fetch-graph semantics
    pub async fn load_with_plan(
        &self,
        root_id: EntityId,
        plan: &EntityGraph<User>,
    ) -> VerifierResult<(User, LoadReport)> {
        debug!("Loading User#{} with plan {:?}", root_id, plan.paths());
        let session = self.database.create_session()?;
        let result = session
            .find_with(root_id, &FindOptions::fetch_graph(plan.clone()))
            .await;
        session.close();

        let user = result?;
        let report = self.report(&user);
        Ok((user, report))
    }

    /// Load a User through [`JOIN_FETCH_QUERY`]
    pub async fn load_with_join_fetch(&self, root_id: EntityId) -> VerifierResult<(User, LoadReport)> {
        let session = self.database.create_session()?;
        let result = Self::single_join_fetch(&session, root_id).await;
        session.close();

        let user = result?;
        let report = self.report(&user);
        Ok((user, report))
    }

    async fn single_join_fetch(session: &Session, root_id: EntityId) -> VerifierResult<User> {
        let query = session
            .create_query::<User>(JOIN_FETCH_QUERY)?
            .set_parameter("id", root_id)?;
        Ok(query.get_single_result().await?)
    }

    /// Check a report against the load state `plan` requires. A path must be
    /// loaded exactly when its id-free form is a plan path.
    pub fn verify(&self, plan: &EntityGraph<User>, report: &LoadReport) -> VerifierResult<()> {
        let paths = plan.paths();
        for (path, actual) in report.iter() {
            let expected = paths.contains(&strip_member_ids(path));
            if expected != actual {
                return Err(VerifierError::Mismatch {
                    path: path.to_string(),
                    expected,
                    actual,
                });
            }
        }
        Ok(())
    }

    fn report(&self, user: &User) -> LoadReport {
        LoadReport::inspect(user, &self.database.persistence_unit_util())
    }
}

/// The four literal scenarios
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scenario {
    BothBranches,
    RelatedDepartmentsOnly,
    DepartmentOnly,
    JoinFetch,
}

impl Scenario {
    pub fn all() -> [Scenario; 4] {
        [
            Scenario::BothBranches,
            Scenario::RelatedDepartmentsOnly,
            Scenario::DepartmentOnly,
            Scenario::JoinFetch,
        ]
    }

    pub fn name(self) -> &'static str {
        match self {
            Scenario::BothBranches => "both_branches",
            Scenario::RelatedDepartmentsOnly => "related_departments_only",
            Scenario::DepartmentOnly => "department_only",
            Scenario::JoinFetch => "join_fetch",
        }
    }

    /// The fetch plan of the scenario. The join-fetch query covers the same
    /// paths as both branches.
    pub fn plan(self) -> EntityGraph<User> {
        let graph = EntityGraph::<User>::new();
        match self {
            Scenario::BothBranches | Scenario::JoinFetch => graph
                .add_subgraph(DEPARTMENT, |g| g.add_attribute_nodes([COMPANY]))
                .add_subgraph(RELATED_DEPARTMENTS, |g| g.add_attribute_nodes([COMPANY])),
            Scenario::RelatedDepartmentsOnly => {
                graph.add_subgraph(RELATED_DEPARTMENTS, |g| g.add_attribute_nodes([COMPANY]))
            }
            Scenario::DepartmentOnly => graph.add_subgraph(DEPARTMENT, |g| g.add_attribute_nodes([COMPANY])),
        }
    }

    pub async fn run(self, verifier: &FetchPlanVerifier) -> VerifierResult<(User, LoadReport)> {
        match self {
            Scenario::JoinFetch => verifier.load_with_join_fetch(USER_ID).await,
            _ => verifier.load_with_plan(USER_ID, &self.plan()).await,
        }
    }

    /// Literal outcome on the fixed dataset
    pub fn expected(self) -> LoadReport {
        match self {
            Scenario::BothBranches | Scenario::JoinFetch => LoadReport::from_entries([
                ("department", true),
                ("department.company", true),
                ("related_departments", true),
                ("related_departments[21].company", true),
                ("related_departments[22].company", true),
            ]),
            Scenario::RelatedDepartmentsOnly => LoadReport::from_entries([
                ("department", false),
                ("related_departments", true),
                ("related_departments[21].company", true),
                ("related_departments[22].company", true),
            ]),
            Scenario::DepartmentOnly => LoadReport::from_entries([
                ("department", true),
                ("department.company", true),
                ("related_departments", false),
            ]),
        }
    }

    /// Compare a report with [`Scenario::expected`], path by path
    pub fn check(self, report: &LoadReport) -> VerifierResult<()> {
        let expected = self.expected();
        for (path, loaded) in expected.iter() {
            let actual = report.is_loaded(path).unwrap_or(false);
            if actual != loaded {
                return Err(VerifierError::Mismatch {
                    path: path.to_string(),
                    expected: loaded,
                    actual,
                });
            }
        }
        for (path, actual) in report.iter() {
            if expected.is_loaded(path).is_none() {
                return Err(VerifierError::Mismatch {
                    path: path.to_string(),
                    expected: false,
                    actual,
                });
            }
        }
        Ok(())
    }
}
