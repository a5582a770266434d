//! The four scenarios and the selective-propagation properties, run against
//! a fresh in-memory database per test.

use std::sync::Arc;

use graphfetch_orm::{ChangeSet, Database, EntityGraph, MemoryBackend, OrmConfig, StorageBackend, StoredRow};
use graphfetch_verifier::{
    init_logging, register_entities, Company, Department, FetchPlanVerifier, FixedDataset, LoadReport,
    LoggingConfig, Scenario, User, VerifierError, USER_ID,
};

async fn verifier() -> anyhow::Result<FetchPlanVerifier> {
    let _ = init_logging(LoggingConfig::test());
    Ok(FetchPlanVerifier::setup(OrmConfig::testing()).await?)
}

#[tokio::test]
async fn scenario_both_branches() -> anyhow::Result<()> {
    let verifier = verifier().await?;
    let (user, report) = Scenario::BothBranches.run(&verifier).await?;

    assert_eq!(report, Scenario::BothBranches.expected());
    verifier.verify(&Scenario::BothBranches.plan(), &report)?;
    assert_eq!(user.department.try_get()?.company.try_get()?.id, 1);
    assert_eq!(user.related_departments.ids(), Some(vec![21, 22]));
    Ok(())
}

#[tokio::test]
async fn scenario_related_departments_only() -> anyhow::Result<()> {
    let verifier = verifier().await?;
    let (user, report) = Scenario::RelatedDepartmentsOnly.run(&verifier).await?;

    Scenario::RelatedDepartmentsOnly.check(&report)?;
    assert!(!user.department.is_loaded());
    assert_eq!(user.department.id(), 11);
    let companies: Vec<_> = user
        .related_departments
        .try_get()?
        .iter()
        .map(|d| d.company.try_get().map(|c| c.id))
        .collect::<Result<_, _>>()?;
    assert_eq!(companies, vec![2, 2]);
    Ok(())
}

#[tokio::test]
async fn scenario_department_only() -> anyhow::Result<()> {
    let verifier = verifier().await?;
    let (user, report) = Scenario::DepartmentOnly.run(&verifier).await?;

    Scenario::DepartmentOnly.check(&report)?;
    assert!(user.department.try_get()?.company.is_loaded());
    assert!(!user.related_departments.is_loaded());
    assert!(user.related_departments.try_get().is_err());
    Ok(())
}

#[tokio::test]
async fn scenario_join_fetch() -> anyhow::Result<()> {
    let verifier = verifier().await?;
    let (user, report) = Scenario::JoinFetch.run(&verifier).await?;

    assert_eq!(user.id, USER_ID);
    Scenario::JoinFetch.check(&report)?;
    assert_eq!(report, Scenario::BothBranches.expected());
    Ok(())
}

#[tokio::test]
async fn every_scenario_matches_its_plan() -> anyhow::Result<()> {
    let verifier = verifier().await?;
    for scenario in Scenario::all() {
        let (_, report) = scenario.run(&verifier).await?;
        scenario.check(&report)?;
        verifier.verify(&scenario.plan(), &report)?;
    }
    Ok(())
}

#[tokio::test]
async fn sibling_branch_eagerness_does_not_leak() -> anyhow::Result<()> {
    let verifier = verifier().await?;
    let (_, report) = Scenario::RelatedDepartmentsOnly.run(&verifier).await?;
    assert_eq!(report.is_loaded("department"), Some(false));
    assert_eq!(report.is_loaded("department.company"), None);

    let (_, report) = Scenario::DepartmentOnly.run(&verifier).await?;
    assert_eq!(report.is_loaded("related_departments"), Some(false));
    assert!(report.iter().all(|(path, _)| !path.starts_with("related_departments[")));
    Ok(())
}

#[tokio::test]
async fn nested_path_implies_parent_loaded() -> anyhow::Result<()> {
    let verifier = verifier().await?;
    let plan = EntityGraph::<User>::from_paths(["department.company"])?;
    let (_, report) = verifier.load_with_plan(USER_ID, &plan).await?;

    assert_eq!(report.is_loaded("department"), Some(true));
    assert_eq!(report.is_loaded("department.company"), Some(true));
    Ok(())
}

#[tokio::test]
async fn absent_associations_stay_deferred() -> anyhow::Result<()> {
    let verifier = verifier().await?;
    let (user, report) = verifier.load_with_plan(USER_ID, &EntityGraph::new()).await?;

    assert_eq!(
        report,
        LoadReport::from_entries([("department", false), ("related_departments", false)])
    );
    assert!(!user.department.is_loaded());
    verifier.verify(&EntityGraph::new(), &report)?;

    let plan = EntityGraph::<User>::new().add_attribute_nodes(["department"]);
    let (user, report) = verifier.load_with_plan(USER_ID, &plan).await?;
    assert_eq!(report.is_loaded("department.company"), Some(false));
    assert!(!user.department.try_get()?.company.is_loaded());
    Ok(())
}

#[tokio::test]
async fn join_fetch_distinct_collapses_duplicates() -> anyhow::Result<()> {
    let verifier = verifier().await?;
    let session = verifier.database().create_session()?;

    let distinct = session
        .create_query::<User>(graphfetch_verifier::JOIN_FETCH_QUERY)?
        .set_parameter("id", USER_ID)?
        .get_result_list()
        .await?;
    assert_eq!(distinct.len(), 1);

    let duplicated = session
        .create_query::<User>(
            "select u from User u join fetch u.department d join fetch d.company \
             join fetch u.related_departments rd join fetch rd.company where u.id = :id",
        )?
        .set_parameter("id", USER_ID)?
        .get_result_list()
        .await?;
    assert_eq!(duplicated.len(), 2);
    assert!(duplicated.iter().all(|u| u.id == USER_ID));
    assert_eq!(duplicated[0], duplicated[1]);

    session.close();
    Ok(())
}

#[tokio::test]
async fn same_plan_twice_gives_identical_reports() -> anyhow::Result<()> {
    let verifier = verifier().await?;
    for scenario in Scenario::all() {
        let (first_user, first) = scenario.run(&verifier).await?;
        let (second_user, second) = scenario.run(&verifier).await?;
        assert_eq!(first, second, "{} is not repeatable", scenario.name());
        assert_eq!(first_user, second_user);
    }
    Ok(())
}

#[tokio::test]
async fn missing_root_is_not_found() -> anyhow::Result<()> {
    let verifier = verifier().await?;
    let err = verifier
        .load_with_plan(99, &Scenario::BothBranches.plan())
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let err = verifier.load_with_join_fetch(99).await.unwrap_err();
    assert!(err.is_not_found());
    Ok(())
}

#[tokio::test]
async fn unknown_association_is_invalid_plan() -> anyhow::Result<()> {
    let verifier = verifier().await?;
    let plan = EntityGraph::<User>::from_paths(["department.manager"])?;
    let err = verifier.load_with_plan(USER_ID, &plan).await.unwrap_err();
    assert!(err.is_invalid_plan());
    assert!(err.to_string().contains("manager"));
    Ok(())
}

#[tokio::test]
async fn failed_setup_leaves_no_partial_rows() -> anyhow::Result<()> {
    let _ = init_logging(LoggingConfig::test());
    // User 1 already stored: only the last row of the dataset collides
    let backend = MemoryBackend::new();
    let mut seeded = ChangeSet::new();
    seeded
        .rows
        .push(("User".into(), StoredRow::new(USER_ID).with_column("department_id", 11)));
    backend.apply(seeded).await?;

    let db = Database::new(OrmConfig::testing(), Arc::new(backend))?;
    register_entities(&db)?;

    let err = FixedDataset::persist(&db).await.unwrap_err();
    assert!(matches!(err, VerifierError::SetupFailure(_)));
    assert_eq!(db.count::<Company>().await?, 0);
    assert_eq!(db.count::<Department>().await?, 0);
    assert_eq!(db.count::<User>().await?, 1);
    Ok(())
}

#[tokio::test]
async fn report_snapshot() -> anyhow::Result<()> {
    let verifier = verifier().await?;
    let (_, report) = Scenario::DepartmentOnly.run(&verifier).await?;

    let json: serde_json::Value = serde_json::from_str(&report.to_json()?)?;
    assert_eq!(
        json,
        serde_json::json!({
            "entries": {
                "department": true,
                "department.company": true,
                "related_departments": false
            }
        })
    );
    Ok(())
}
