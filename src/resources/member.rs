//! Family members. A member belongs to a tree and is owned by that tree's
//! creator; `added_by` only records who entered it.
//!
//! Spouse and parent links never leave the member's tree.

use std::collections::BTreeSet;

use jiff::civil::Date;
use libsql::{Connection, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Resource, Tree, require, require_text};
use crate::guard::MutationGuard;
use crate::listing::ListParams;
use crate::ownership::{OwnershipChain, OwnershipResolvable};
use crate::permission::{Action, IsOwnerOrStaff, RoleActionPermission};
use crate::principal::UserId;
use crate::response::{self, HttpResponse};
use crate::router::{Context, Router};
use crate::{Error, Module, Result, db};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
        }
    }

    fn parse(raw: &str) -> Result<Self> {
        match raw {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            "other" => Ok(Gender::Other),
            other => Err(Error::Internal(format!("Invalid gender {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Member {
    pub id: Uuid,
    pub tree: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub gender: Option<Gender>,
    pub birth_date: Option<Date>,
    pub death_date: Option<Date>,
    pub relationship: String,
    pub notes: String,
    pub nickname: String,
    pub location: String,
    pub spouse: Option<Uuid>,
    /// Sorted, without duplicates.
    pub parents: Vec<Uuid>,
    pub is_alive: bool,
    pub added_by: Option<UserId>,
    /// Creator of `tree`, loaded with the record.
    #[serde(skip)]
    pub tree_owner: UserId,
}

impl Member {
    pub fn name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

impl OwnershipResolvable for Member {
    const KIND: &'static str = "member";

    fn ownership(&self) -> OwnershipChain {
        OwnershipChain::new().tree(self.tree_owner)
    }
}

#[derive(Debug, Deserialize)]
pub struct NewMember {
    pub tree: Uuid,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub birth_date: Option<Date>,
    #[serde(default)]
    pub death_date: Option<Date>,
    #[serde(default)]
    pub relationship: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub spouse: Option<Uuid>,
    #[serde(default)]
    pub parents: Vec<Uuid>,
    #[serde(default = "alive")]
    pub is_alive: bool,
}

fn alive() -> bool {
    true
}

/// Partial update. For nullable fields, an explicit `null` clears the value.
#[derive(Debug, Default, Deserialize)]
pub struct MemberPatch {
    pub tree: Option<Uuid>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub gender: Option<Option<Gender>>,
    #[serde(default, deserialize_with = "nullable")]
    pub birth_date: Option<Option<Date>>,
    #[serde(default, deserialize_with = "nullable")]
    pub death_date: Option<Option<Date>>,
    pub relationship: Option<String>,
    pub notes: Option<String>,
    pub nickname: Option<String>,
    pub location: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub spouse: Option<Option<Uuid>>,
    /// Replaces the whole parent set.
    pub parents: Option<Vec<Uuid>>,
    pub is_alive: Option<bool>,
}

/// Distinguish an absent field (`None`) from an explicit `null` (`Some(None)`).
pub(crate) fn nullable<'de, T, D>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn distinct(ids: Vec<Uuid>) -> Vec<Uuid> {
    ids.into_iter().collect::<BTreeSet<_>>().into_iter().collect()
}

/// Whether `id` names another member of `member`'s tree.
async fn is_relative(conn: &Connection, member: &Member, id: Uuid) -> Result<bool> {
    if id == member.id {
        return Ok(false);
    }
    let other = super::fetch::<Member>(conn, id).await?;
    Ok(other.is_some_and(|other| other.tree == member.tree))
}

/// Spouse and parents must be other members of the same tree. Unknown and
/// foreign ids get the same answer.
async fn check_relatives(conn: &Connection, member: &Member) -> Result<()> {
    if let Some(spouse) = member.spouse
        && !is_relative(conn, member, spouse).await?
    {
        return Err(Error::BadRequest(
            "Spouse must be another member of the same tree".into(),
        ));
    }
    for &parent in &member.parents {
        if !is_relative(conn, member, parent).await? {
            return Err(Error::BadRequest(
                "Parents must be other members of the same tree".into(),
            ));
        }
    }
    Ok(())
}

/// Drop every link that points at `member` from its old tree.
async fn detach(conn: &Connection, member: &Member) -> Result<()> {
    let id = member.id.to_string();
    conn.execute(
        "UPDATE members SET spouse_id = NULL WHERE spouse_id = ?1",
        libsql::params![id.clone()],
    )
    .await?;
    conn.execute(
        "DELETE FROM member_parents WHERE parent_id = ?1",
        libsql::params![id],
    )
    .await?;
    Ok(())
}

/// Load the tree a member is (or will be) attached to.
async fn parent_tree(conn: &Connection, id: Uuid) -> Result<Tree> {
    super::fetch::<Tree>(conn, id)
        .await?
        .ok_or_else(|| Error::BadRequest(format!("Unknown tree {id}")))
}

async fn save(conn: &Connection, member: &Member) -> Result<()> {
    conn.execute(
        "UPDATE members SET tree_id = ?2, first_name = ?3, last_name = ?4, gender = ?5, \
         birth_date = ?6, death_date = ?7, relationship = ?8, notes = ?9, nickname = ?10, \
         location = ?11, spouse_id = ?12, is_alive = ?13 WHERE id = ?1",
        libsql::params![
            member.id.to_string(),
            member.tree.to_string(),
            member.first_name.clone(),
            member.last_name.clone(),
            member.gender.map(|g| g.as_str().to_string()),
            db::opt_text(member.birth_date),
            db::opt_text(member.death_date),
            member.relationship.clone(),
            member.notes.clone(),
            member.nickname.clone(),
            member.location.clone(),
            db::opt_text(member.spouse),
            i64::from(member.is_alive),
        ],
    )
    .await?;

    conn.execute(
        "DELETE FROM member_parents WHERE member_id = ?1",
        libsql::params![member.id.to_string()],
    )
    .await?;
    for parent in &member.parents {
        conn.execute(
            "INSERT INTO member_parents (member_id, parent_id) VALUES (?1, ?2)",
            libsql::params![member.id.to_string(), parent.to_string()],
        )
        .await?;
    }
    Ok(())
}

impl Resource for Member {
    const PATH: &'static str = "/api/members";
    const TABLE: &'static str = "members";
    const SELECT: &'static str = "SELECT r.id, r.tree_id, r.first_name, r.last_name, r.gender, \
         r.birth_date, r.death_date, r.relationship, r.notes, r.nickname, r.location, \
         r.spouse_id, r.is_alive, r.added_by, t.created_by, \
         (SELECT group_concat(p.parent_id) FROM member_parents p WHERE p.member_id = r.id) \
         FROM members r JOIN trees t ON t.id = r.tree_id";
    const OWNER: &'static str = "t.created_by";
    const SEARCH: &'static [&'static str] =
        &["r.first_name", "r.last_name", "r.nickname", "r.location"];
    const ORDERING: &'static [(&'static str, &'static str)] = &[
        ("first_name", "r.first_name"),
        ("last_name", "r.last_name"),
        ("birth_date", "r.birth_date"),
    ];
    const DEFAULT_ORDER: &'static str = "r.last_name, r.first_name";

    type New = NewMember;
    type Patch = MemberPatch;

    fn from_row(row: &Row) -> Result<Self> {
        let gender: Option<String> = row.get(4)?;
        Ok(Member {
            id: db::uuid_at(row, 0)?,
            tree: db::uuid_at(row, 1)?,
            first_name: row.get(2)?,
            last_name: row.get(3)?,
            gender: gender.as_deref().map(Gender::parse).transpose()?,
            birth_date: db::opt_date_at(row, 5)?,
            death_date: db::opt_date_at(row, 6)?,
            relationship: row.get(7)?,
            notes: row.get(8)?,
            nickname: row.get(9)?,
            location: row.get(10)?,
            spouse: db::opt_uuid_at(row, 11)?,
            is_alive: db::bool_at(row, 12)?,
            added_by: db::opt_uuid_at(row, 13)?,
            tree_owner: db::uuid_at(row, 14)?,
            parents: db::uuid_list_at(row, 15)?,
        })
    }

    async fn insert(conn: &Connection, guard: &MutationGuard<'_>, input: NewMember) -> Result<Self> {
        require_text("first_name", &input.first_name)?;
        require_text("last_name", &input.last_name)?;
        let tree = parent_tree(conn, input.tree).await?;
        guard.create_under(&tree)?;

        let member = Member {
            id: Uuid::new_v4(),
            tree: tree.id,
            first_name: input.first_name,
            last_name: input.last_name,
            gender: input.gender,
            birth_date: input.birth_date,
            death_date: input.death_date,
            relationship: input.relationship,
            notes: input.notes,
            nickname: input.nickname,
            location: input.location,
            spouse: input.spouse,
            parents: distinct(input.parents),
            is_alive: input.is_alive,
            added_by: Some(guard.stamp()),
            tree_owner: tree.created_by,
        };
        check_relatives(conn, &member).await?;

        conn.execute(
            "INSERT INTO members (id, tree_id, first_name, last_name, added_by) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            libsql::params![
                member.id.to_string(),
                member.tree.to_string(),
                member.first_name.clone(),
                member.last_name.clone(),
                db::opt_text(member.added_by),
            ],
        )
        .await?;
        save(conn, &member).await?;
        Ok(member)
    }

    async fn patch(
        conn: &Connection,
        guard: &MutationGuard<'_>,
        mut existing: Self,
        patch: MemberPatch,
    ) -> Result<Self> {
        if let Some(tree_id) = patch.tree
            && tree_id != existing.tree
        {
            let tree = parent_tree(conn, tree_id).await?;
            guard.relocate(&tree)?;
            existing.tree = tree.id;
            existing.tree_owner = tree.created_by;
            // Relatives stay behind in the old tree.
            existing.spouse = None;
            existing.parents.clear();
            detach(conn, &existing).await?;
        }
        if let Some(first_name) = patch.first_name {
            require_text("first_name", &first_name)?;
            existing.first_name = first_name;
        }
        if let Some(last_name) = patch.last_name {
            require_text("last_name", &last_name)?;
            existing.last_name = last_name;
        }
        if let Some(gender) = patch.gender {
            existing.gender = gender;
        }
        if let Some(birth_date) = patch.birth_date {
            existing.birth_date = birth_date;
        }
        if let Some(death_date) = patch.death_date {
            existing.death_date = death_date;
        }
        if let Some(relationship) = patch.relationship {
            existing.relationship = relationship;
        }
        if let Some(notes) = patch.notes {
            existing.notes = notes;
        }
        if let Some(nickname) = patch.nickname {
            existing.nickname = nickname;
        }
        if let Some(location) = patch.location {
            existing.location = location;
        }
        if let Some(spouse) = patch.spouse {
            existing.spouse = spouse;
        }
        if let Some(parents) = patch.parents {
            existing.parents = distinct(parents);
        }
        if let Some(is_alive) = patch.is_alive {
            existing.is_alive = is_alive;
        }
        check_relatives(conn, &existing).await?;

        save(conn, &existing).await?;
        Ok(existing)
    }

    async fn after_insert(conn: &Connection, record: &Self) -> Result<()> {
        crate::notify::member_added(conn, record).await
    }

    async fn after_patch(conn: &Connection, before: &Self, after: &Self) -> Result<()> {
        crate::notify::member_updated(conn, before, after).await
    }
}

/// Members of one tree, for `GET /api/trees/{id}/members`.
///
/// The tree itself goes through the object gate, so a foreign tree is
/// forbidden rather than silently empty.
pub async fn list_for_tree(ctx: Context) -> Result<HttpResponse> {
    let who = ctx.authenticate().await?;
    let principal = RoleActionPermission::check(who.as_ref(), Action::Read)?;
    let tree_id = ctx.require_id()?;
    let params = ListParams::from_query(ctx.query())?;

    let db = ctx.require_db()?;
    let conn = db.lock().await;
    let tree = require::<Tree>(&conn, tree_id).await?;
    IsOwnerOrStaff::check(Some(principal), &tree)?;

    let sql = format!(
        "{} WHERE r.tree_id = ?1 ORDER BY {}",
        Member::SELECT,
        params.order_by(Member::ORDERING, Member::DEFAULT_ORDER)?
    );
    let mut rows = conn
        .query(&sql, libsql::params![tree.id.to_string()])
        .await?;
    let mut members = Vec::new();
    while let Some(row) = rows.next().await? {
        members.push(Member::from_row(&row)?);
    }
    response::ok(&members)
}

pub struct MembersModule;

impl Module for MembersModule {
    fn name(&self) -> &'static str {
        "members"
    }

    fn routes(&self, router: &mut Router) {
        super::mount::<Member>(router);
    }
}
