//! Per-user profile. Each user has at most one, owned by that user.

use jiff::civil::Date;
use libsql::{Connection, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Resource;
use super::member::nullable;
use crate::guard::MutationGuard;
use crate::ownership::{OwnershipChain, OwnershipResolvable};
use crate::principal::UserId;
use crate::router::Router;
use crate::{Error, Module, Result, db};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Profile {
    pub id: Uuid,
    pub user: UserId,
    pub nickname: String,
    pub profile_photo: Option<String>,
    pub current_location: String,
    pub birthday: Option<Date>,
}

impl OwnershipResolvable for Profile {
    const KIND: &'static str = "profile";

    fn ownership(&self) -> OwnershipChain {
        OwnershipChain::new().user(self.user)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct NewProfile {
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub profile_photo: Option<String>,
    #[serde(default)]
    pub current_location: String,
    #[serde(default)]
    pub birthday: Option<Date>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProfilePatch {
    pub nickname: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub profile_photo: Option<Option<String>>,
    pub current_location: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub birthday: Option<Option<Date>>,
}

async fn save(conn: &Connection, profile: &Profile) -> Result<()> {
    conn.execute(
        "UPDATE user_profiles SET nickname = ?2, profile_photo = ?3, current_location = ?4, \
         birthday = ?5 WHERE id = ?1",
        libsql::params![
            profile.id.to_string(),
            profile.nickname.clone(),
            profile.profile_photo.clone(),
            profile.current_location.clone(),
            db::opt_text(profile.birthday),
        ],
    )
    .await?;
    Ok(())
}

impl Resource for Profile {
    const PATH: &'static str = "/api/userprofiles";
    const TABLE: &'static str = "user_profiles";
    const SELECT: &'static str = "SELECT r.id, r.user_id, r.nickname, r.profile_photo, \
         r.current_location, r.birthday \
         FROM user_profiles r JOIN users u ON u.id = r.user_id";
    const OWNER: &'static str = "r.user_id";
    const SEARCH: &'static [&'static str] = &["r.nickname", "r.current_location", "u.username"];
    const ORDERING: &'static [(&'static str, &'static str)] =
        &[("nickname", "r.nickname"), ("birthday", "r.birthday")];
    const DEFAULT_ORDER: &'static str = "u.username";

    type New = NewProfile;
    type Patch = ProfilePatch;

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Profile {
            id: db::uuid_at(row, 0)?,
            user: db::uuid_at(row, 1)?,
            nickname: row.get(2)?,
            profile_photo: row.get(3)?,
            current_location: row.get(4)?,
            birthday: db::opt_date_at(row, 5)?,
        })
    }

    async fn insert(conn: &Connection, guard: &MutationGuard<'_>, input: NewProfile) -> Result<Self> {
        let user = guard.stamp();
        let mut rows = conn
            .query(
                "SELECT 1 FROM user_profiles WHERE user_id = ?1",
                libsql::params![user.to_string()],
            )
            .await?;
        if rows.next().await?.is_some() {
            return Err(Error::Conflict("Profile already exists".into()));
        }

        let profile = Profile {
            id: Uuid::new_v4(),
            user,
            nickname: input.nickname,
            profile_photo: input.profile_photo,
            current_location: input.current_location,
            birthday: input.birthday,
        };
        conn.execute(
            "INSERT INTO user_profiles (id, user_id) VALUES (?1, ?2)",
            libsql::params![profile.id.to_string(), profile.user.to_string()],
        )
        .await?;
        save(conn, &profile).await?;
        Ok(profile)
    }

    async fn patch(
        conn: &Connection,
        _guard: &MutationGuard<'_>,
        mut existing: Self,
        patch: ProfilePatch,
    ) -> Result<Self> {
        if let Some(nickname) = patch.nickname {
            existing.nickname = nickname;
        }
        if let Some(photo) = patch.profile_photo {
            existing.profile_photo = photo;
        }
        if let Some(location) = patch.current_location {
            existing.current_location = location;
        }
        if let Some(birthday) = patch.birthday {
            existing.birthday = birthday;
        }
        save(conn, &existing).await?;
        Ok(existing)
    }
}

pub struct ProfilesModule;

impl Module for ProfilesModule {
    fn name(&self) -> &'static str {
        "profiles"
    }

    fn routes(&self, router: &mut Router) {
        super::mount::<Profile>(router);
    }
}
