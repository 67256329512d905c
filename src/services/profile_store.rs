use std::sync::Arc;

use crate::{
    constants::{MAX_AVATAR_BYTES, PROFILE_STORAGE_PREFIX},
    error::{AppError, Result},
    models::{ProfileUpdate, UserProfile},
    services::kv_store::KvStore,
};

pub fn profile_key(wallet: &str) -> String {
    format!("{}{}", PROFILE_STORAGE_PREFIX, wallet.trim().to_lowercase())
}

#[derive(Clone)]
pub struct ProfileStore {
    kv: Arc<dyn KvStore>,
}

impl ProfileStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Stored profile, or a bare one carrying only the wallet. An unreadable
    /// record is treated like a missing one.
    pub async fn load(&self, wallet: &str) -> Result<UserProfile> {
        let Some(raw) = self.kv.get(&profile_key(wallet)).await? else {
            return Ok(UserProfile::for_wallet(wallet));
        };
        match serde_json::from_str::<UserProfile>(&raw) {
            Ok(mut profile) => {
                profile.wallet_address = wallet.to_string();
                Ok(profile)
            }
            Err(err) => {
                tracing::warn!("profile record unreadable wallet={} err={}", wallet, err);
                Ok(UserProfile::for_wallet(wallet))
            }
        }
    }

    /// Replaces username and avatar. Blank values clear the field.
    pub async fn update(&self, wallet: &str, update: ProfileUpdate) -> Result<UserProfile> {
        let avatar = update
            .avatar
            .map(|avatar| avatar.trim().to_string())
            .filter(|avatar| !avatar.is_empty());
        if let Some(avatar) = avatar.as_deref() {
            validate_avatar(avatar)?;
        }

        let profile = UserProfile {
            username: update
                .username
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty()),
            avatar,
            wallet_address: wallet.to_string(),
        };

        let encoded = serde_json::to_string(&profile)?;
        self.kv.set(&profile_key(wallet), &encoded).await?;
        tracing::info!(
            "profile saved wallet={} username={} avatar={}",
            wallet,
            profile.username.is_some(),
            profile.avatar.is_some()
        );
        Ok(profile)
    }
}

fn validate_avatar(avatar: &str) -> Result<()> {
    if avatar.starts_with("https://") || avatar.starts_with("http://") {
        return Ok(());
    }
    let Some(rest) = avatar.strip_prefix("data:image/") else {
        return Err(AppError::BadRequest(
            "avatar must be an image data URI or an http(s) URL".to_string(),
        ));
    };
    let payload = rest.split_once(',').map(|(_, data)| data).unwrap_or_default();
    let approx_bytes = payload.len() / 4 * 3;
    if approx_bytes > MAX_AVATAR_BYTES {
        return Err(AppError::BadRequest("Image size must be less than 2MB".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::kv_store::MemoryKvStore;

    fn store() -> (ProfileStore, MemoryKvStore) {
        let kv = MemoryKvStore::new();
        (ProfileStore::new(Arc::new(kv.clone())), kv)
    }

    #[test]
    fn keys_are_lowercased() {
        assert_eq!(profile_key("0xAbCDef"), "user_profile_0xabcdef");
    }

    #[tokio::test]
    async fn missing_profile_defaults_to_wallet_only() {
        let (profiles, _) = store();
        let profile = profiles.load("0xabc").await.expect("load");
        assert_eq!(profile, UserProfile::for_wallet("0xabc"));
        assert!(!profile.has_profile());
    }

    #[tokio::test]
    async fn update_persists_under_lowercased_key() {
        let (profiles, kv) = store();
        let saved = profiles
            .update(
                "0xABC",
                ProfileUpdate {
                    username: Some("  margot ".to_string()),
                    avatar: Some("https://cdn.example.com/a.png".to_string()),
                },
            )
            .await
            .expect("update");
        assert_eq!(saved.username.as_deref(), Some("margot"));

        assert!(kv.get("user_profile_0xabc").await.expect("get").is_some());
        let loaded = profiles.load("0xabc").await.expect("load");
        assert_eq!(loaded.username.as_deref(), Some("margot"));
        assert!(loaded.has_profile());
    }

    #[tokio::test]
    async fn blank_fields_clear_profile() {
        let (profiles, _) = store();
        profiles
            .update(
                "0xabc",
                ProfileUpdate {
                    username: Some("yoon".to_string()),
                    avatar: None,
                },
            )
            .await
            .expect("first save");
        let cleared = profiles
            .update(
                "0xabc",
                ProfileUpdate {
                    username: Some("   ".to_string()),
                    avatar: None,
                },
            )
            .await
            .expect("second save");
        assert!(!cleared.has_profile());
    }

    #[tokio::test]
    async fn rejects_non_image_avatars() {
        let (profiles, _) = store();
        let err = profiles
            .update(
                "0xabc",
                ProfileUpdate {
                    username: None,
                    avatar: Some("data:text/html,<script>".to_string()),
                },
            )
            .await
            .expect_err("not an image");
        assert!(matches!(err, AppError::BadRequest(_)));

        let oversized = format!("data:image/png;base64,{}", "A".repeat(3 * 1024 * 1024));
        let err = profiles
            .update(
                "0xabc",
                ProfileUpdate {
                    username: None,
                    avatar: Some(oversized),
                },
            )
            .await
            .expect_err("too large");
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn corrupt_record_falls_back_to_default() {
        let (profiles, kv) = store();
        kv.set("user_profile_0xabc", "{not json").await.expect("set");
        let profile = profiles.load("0xabc").await.expect("load");
        assert_eq!(profile, UserProfile::for_wallet("0xabc"));
    }
}
