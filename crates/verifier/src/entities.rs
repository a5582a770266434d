//! Company, Department and User
//!
//! Every association is declared lazy: nothing is materialized unless a
//! fetch plan or a join fetch asks for it.

use graphfetch_orm::{
    Collection, Database, EntityId, EntityMetadata, EntityRecord, HydratedEntity, LoadState, Model,
    ModelError, ModelResult, PivotConfig, Reference, RelationshipMetadata,
};

pub const DEPARTMENT: &str = "department";
pub const RELATED_DEPARTMENTS: &str = "related_departments";
pub const COMPANY: &str = "company";

/// Register the three entities with a database
pub fn register_entities(database: &Database) -> ModelResult<()> {
    database.register::<Company>()?;
    database.register::<Department>()?;
    database.register::<User>()?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct Company {
    pub id: EntityId,
}

impl Company {
    pub fn new(id: EntityId) -> Self {
        Self { id }
    }
}

impl Model for Company {
    fn entity_name() -> &'static str {
        "Company"
    }

    fn metadata() -> EntityMetadata {
        EntityMetadata::new("Company")
    }

    fn id(&self) -> EntityId {
        self.id
    }

    fn to_record(&self) -> ModelResult<EntityRecord> {
        Ok(EntityRecord::new("Company", self.id))
    }

    fn hydrate(entity: HydratedEntity) -> ModelResult<Self> {
        Ok(Company { id: entity.id })
    }

    fn load_state(&self, _association: &str) -> Option<LoadState> {
        None
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Department {
    pub id: EntityId,
    pub company: Reference<Company>,
}

impl Department {
    pub fn new(id: EntityId, company: &Company) -> Self {
        Self {
            id,
            company: Reference::Deferred(company.id),
        }
    }
}

impl Model for Department {
    fn entity_name() -> &'static str {
        "Department"
    }

    fn metadata() -> EntityMetadata {
        EntityMetadata::new("Department").with_relationship(RelationshipMetadata::belongs_to(
            COMPANY,
            "Company",
            "company_id",
        ))
    }

    fn id(&self) -> EntityId {
        self.id
    }

    fn to_record(&self) -> ModelResult<EntityRecord> {
        Ok(EntityRecord::new("Department", self.id).reference(COMPANY, self.company.id()))
    }

    fn hydrate(mut entity: HydratedEntity) -> ModelResult<Self> {
        Ok(Department {
            id: entity.id,
            company: entity.take_reference(COMPANY)?,
        })
    }

    fn load_state(&self, association: &str) -> Option<LoadState> {
        match association {
            COMPANY => Some(self.company.load_state()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: EntityId,
    pub department: Reference<Department>,
    pub related_departments: Collection<Department>,
}

impl User {
    pub fn new<I>(id: EntityId, department: &Department, related_departments: I) -> Self
    where
        I: IntoIterator<Item = Department>,
    {
        Self {
            id,
            department: Reference::Deferred(department.id),
            related_departments: Collection::resolved(related_departments),
        }
    }
}

impl Model for User {
    fn entity_name() -> &'static str {
        "User"
    }

    fn metadata() -> EntityMetadata {
        EntityMetadata::new("User")
            .with_relationship(RelationshipMetadata::belongs_to(
                DEPARTMENT,
                "Department",
                "department_id",
            ))
            .with_relationship(RelationshipMetadata::many_to_many(
                RELATED_DEPARTMENTS,
                "Department",
                PivotConfig::new("User_Department", "User_id", "relatedDepartments_id"),
            ))
    }

    fn id(&self) -> EntityId {
        self.id
    }

    fn to_record(&self) -> ModelResult<EntityRecord> {
        let related = self.related_departments.ids().ok_or_else(|| {
            ModelError::Validation(format!(
                "User#{} cannot be persisted with a deferred {} collection",
                self.id, RELATED_DEPARTMENTS
            ))
        })?;
        Ok(EntityRecord::new("User", self.id)
            .reference(DEPARTMENT, self.department.id())
            .collection(RELATED_DEPARTMENTS, related))
    }

    fn hydrate(mut entity: HydratedEntity) -> ModelResult<Self> {
        Ok(User {
            id: entity.id,
            department: entity.take_reference(DEPARTMENT)?,
            related_departments: entity.take_collection(RELATED_DEPARTMENTS)?,
        })
    }

    fn load_state(&self, association: &str) -> Option<LoadState> {
        match association {
            DEPARTMENT => Some(self.department.load_state()),
            RELATED_DEPARTMENTS => Some(self.related_departments.load_state()),
            _ => None,
        }
    }
}
