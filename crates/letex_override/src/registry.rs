//! Override-source discovery and priority-ordered lookup.
//!
//! [`ManifestRegistry::discover`] walks a game's DLC root once at startup,
//! loads the manifest of every `DLC_MOD_*` source that carries one, and
//! orders the survivors by mount priority. After that the registry is the
//! single lookup surface: [`resolve`](ManifestRegistry::resolve) finds the
//! winning entry for a texture path and
//! [`apply_to`](ManifestRegistry::apply_to) rebuilds a host texture from it.
//!
//! A source that fails any step of discovery is skipped with a log entry;
//! one broken pack never takes down the others.

use std::cmp::Reverse;
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use letex_manifest::{IdentityCheck, ManifestLoader, TextureEntry, SOURCE_NAME_PREFIX};

use crate::error::Result;
use crate::mount::{read_mount_priority, GameTarget};
use crate::rebuild::rebuild_texture;
use crate::texture::{OodleDecompressor, Texture2d};
use crate::MANIFEST_FILE_NAME;

/// One successfully mounted override source.
pub struct LoadedSource {
    /// Folder name of the source, prefix included.
    pub dlc_name: String,
    /// Mount priority from the source's descriptor; higher wins.
    pub priority: i32,
    pub manifest: ManifestLoader,
}

/// Counters over texture lookups that found no override.
///
/// Misses are the common case and the only pure overhead this subsystem
/// adds; hits are dominated by the rebuild itself and are not timed.
#[derive(Debug, Clone, Copy, Default)]
pub struct OverrideStats {
    pub invocations: u64,
    pub total_time: Duration,
}

/// All mounted override sources for one game, ordered by descending mount
/// priority.
///
/// The registry is an explicit context object: callers own it, thread it to
/// the deserialization hook, and may flip [`set_enabled`] at runtime to
/// bypass overrides without unmounting anything.
///
/// [`set_enabled`]: ManifestRegistry::set_enabled
pub struct ManifestRegistry {
    sources: Vec<LoadedSource>,
    enabled: bool,
    stats: OverrideStats,
}

impl ManifestRegistry {
    /// Discover and mount every override source under `root`.
    ///
    /// Candidates are directories whose name starts with `DLC_MOD_` followed
    /// by a non-empty identity. A candidate without a manifest file is not an
    /// override source and is passed over silently; a candidate whose mount
    /// descriptor or manifest fails to load is logged and skipped. The
    /// manifest check runs before the descriptor is read, so a non-texture
    /// DLC with a broken descriptor stays quiet too. Only failing to
    /// enumerate `root` itself is an error.
    ///
    /// Candidates are visited in lexicographic name order, which makes the
    /// priority tie-break deterministic across filesystems.
    pub fn discover(
        root: &Utf8Path,
        game: GameTarget,
        identity_check: IdentityCheck,
    ) -> Result<Self> {
        tracing::info!("looking for texture override sources in {}", root);

        let mut candidates: Vec<Utf8PathBuf> = Vec::new();
        for dir_entry in std::fs::read_dir(root.as_std_path())? {
            let dir_entry = dir_entry?;
            if !dir_entry.file_type()?.is_dir() {
                continue;
            }
            let Ok(path) = Utf8PathBuf::from_path_buf(dir_entry.path()) else {
                tracing::warn!("skipping non-UTF-8 directory name in {}", root);
                continue;
            };
            candidates.push(path);
        }
        candidates.sort();

        let mut sources = Vec::new();
        for dir in candidates {
            let Some(source) = Self::mount_source(&dir, game, identity_check) else {
                continue;
            };
            sources.push(source);
        }

        // Stable: sources tied on priority stay in discovery order.
        sources.sort_by_key(|source| Reverse(source.priority));

        for source in &sources {
            tracing::debug!("mounted {} at priority {}", source.dlc_name, source.priority);
        }

        Ok(Self { sources, enabled: true, stats: OverrideStats::default() })
    }

    /// Try to mount the candidate directory at `dir` as an override source.
    fn mount_source(
        dir: &Utf8Path,
        game: GameTarget,
        identity_check: IdentityCheck,
    ) -> Option<LoadedSource> {
        let name = dir.file_name()?;
        let identity = name.strip_prefix(SOURCE_NAME_PREFIX).filter(|rest| !rest.is_empty())?;

        let manifest_path = dir.join(MANIFEST_FILE_NAME);
        if !manifest_path.as_std_path().is_file() {
            // Most DLC mods are not texture packs.
            tracing::trace!("no manifest in {}, skipping", dir);
            return None;
        }

        let priority = match read_mount_priority(dir, game) {
            Ok(priority) => priority,
            Err(error) => {
                tracing::warn!("failed to read mount priority of {}: {}", name, error);
                return None;
            }
        };

        let manifest = match ManifestLoader::load(&manifest_path, game.name(), identity, identity_check)
        {
            Ok(manifest) => manifest,
            Err(error) => {
                tracing::error!("failed to load manifest {}: {}", manifest_path, error);
                return None;
            }
        };

        Some(LoadedSource { dlc_name: name.to_string(), priority, manifest })
    }

    /// Find the winning override entry for `full_path`, if any.
    ///
    /// Sources are consulted in descending priority order and the first
    /// match wins.
    pub fn resolve(&self, full_path: &str) -> Option<(&LoadedSource, TextureEntry<'_>)> {
        self.sources
            .iter()
            .find_map(|source| source.manifest.find_entry(full_path).map(|entry| (source, entry)))
    }

    /// Resolve `full_path` and, on a hit, rebuild `texture` from the winning
    /// entry. Returns whether an override was applied.
    ///
    /// Only misses are counted in [`stats`](ManifestRegistry::stats): they
    /// measure the scan overhead added to textures that end up untouched,
    /// which replacements dwarf anyway. A disabled registry is a no-op that
    /// does not touch the counters.
    pub fn apply_to(
        &mut self,
        texture: &mut Texture2d,
        full_path: &str,
        oodle: &dyn OodleDecompressor,
    ) -> bool {
        if !self.enabled {
            return false;
        }

        let started = Instant::now();
        match self.resolve(full_path) {
            Some((source, entry)) => {
                tracing::info!("replacing {} from {}", full_path, source.dlc_name);
                rebuild_texture(texture, &source.manifest, entry, oodle);
                true
            }
            None => {
                self.stats.invocations += 1;
                self.stats.total_time += started.elapsed();
                false
            }
        }
    }

    /// Mounted sources in descending priority order.
    pub fn sources(&self) -> &[LoadedSource] {
        &self.sources
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Enable or disable override application at runtime.
    ///
    /// Disabling does not unmount anything; re-enabling picks the mounted
    /// sources right back up.
    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled != enabled {
            tracing::info!("texture overrides {}", if enabled { "enabled" } else { "disabled" });
        }
        self.enabled = enabled;
    }

    pub fn stats(&self) -> OverrideStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use letex_manifest::builder::{EntryDef, ManifestBuilder, MipDef};
    use letex_manifest::TfcGuid;
    use tempfile::TempDir;

    const TARGET: GameTarget = GameTarget::Le1;

    fn root_path(dir: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap()
    }

    /// Create a `DLC_MOD_<identity>` source with an AutoLoad mount and a
    /// manifest overriding the given texture paths.
    fn make_source(root: &Utf8Path, identity: &str, priority: i32, paths: &[&str]) {
        // Surface skip-path warnings under RUST_LOG; idempotent across tests.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let dir = root.join(format!("{SOURCE_NAME_PREFIX}{identity}"));
        std::fs::create_dir_all(dir.as_std_path()).unwrap();
        std::fs::write(
            dir.join("AutoLoad.ini").as_std_path(),
            format!("[ME1DLCMOUNT]\nModMount = {priority}\n"),
        )
        .unwrap();

        let mut builder = ManifestBuilder::new(TARGET.name(), identity);
        let tfc = builder.add_tfc_ref(TfcGuid::default(), "None");
        for path in paths {
            builder.add_entry(EntryDef {
                full_path: path.to_string(),
                tfc_ref_index: tfc,
                format: 2,
                lod_bias: 0,
                never_stream: false,
                srgb: false,
                mips: vec![MipDef::Embedded {
                    width: 4,
                    height: 4,
                    uncompressed_size: 4,
                    payload: {
                        let mut payload = identity.as_bytes().to_vec();
                        payload.resize(4, 0);
                        payload
                    },
                    oodle: false,
                }],
            });
        }
        std::fs::write(dir.join(MANIFEST_FILE_NAME).as_std_path(), builder.build().unwrap())
            .unwrap();
    }

    fn discover(root: &Utf8Path) -> ManifestRegistry {
        ManifestRegistry::discover(root, TARGET, IdentityCheck::Strict).unwrap()
    }

    #[test]
    fn sources_are_ordered_by_descending_priority() {
        let dir = TempDir::new().unwrap();
        let root = root_path(&dir);
        make_source(&root, "Alpha", 5, &["TEX_Shared"]);
        make_source(&root, "Bravo", 20, &["TEX_Shared"]);
        make_source(&root, "Charlie", 5, &["TEX_Shared"]);
        make_source(&root, "Delta", 1, &["TEX_Shared"]);

        let registry = discover(&root);
        let order: Vec<(&str, i32)> = registry
            .sources()
            .iter()
            .map(|source| (source.dlc_name.as_str(), source.priority))
            .collect();
        assert_eq!(
            order,
            [("DLC_MOD_Bravo", 20), ("DLC_MOD_Alpha", 5), ("DLC_MOD_Charlie", 5), ("DLC_MOD_Delta", 1)]
        );
    }

    #[test]
    fn resolve_prefers_higher_priority_and_first_discovered_on_ties() {
        let dir = TempDir::new().unwrap();
        let root = root_path(&dir);
        make_source(&root, "Alpha", 5, &["TEX_Tied"]);
        make_source(&root, "Charlie", 5, &["TEX_Tied", "TEX_Solo"]);

        let registry = discover(&root);

        let (winner, _) = registry.resolve("TEX_Tied").unwrap();
        assert_eq!(winner.dlc_name, "DLC_MOD_Alpha");

        let (only, _) = registry.resolve("TEX_Solo").unwrap();
        assert_eq!(only.dlc_name, "DLC_MOD_Charlie");

        assert!(registry.resolve("TEX_Nowhere").is_none());
    }

    #[test]
    fn non_source_directories_are_ignored() {
        let dir = TempDir::new().unwrap();
        let root = root_path(&dir);
        make_source(&root, "Real", 10, &["TEX_A"]);

        // Wrong prefix, empty identity, and a stray file.
        std::fs::create_dir(root.join("DLC_Unrelated").as_std_path()).unwrap();
        std::fs::create_dir(root.join("DLC_MOD_").as_std_path()).unwrap();
        std::fs::write(root.join("DLC_MOD_File").as_std_path(), b"not a dir").unwrap();

        let registry = discover(&root);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.sources()[0].dlc_name, "DLC_MOD_Real");
    }

    #[test]
    fn source_without_manifest_is_skipped_silently() {
        let dir = TempDir::new().unwrap();
        let root = root_path(&dir);
        make_source(&root, "Textured", 10, &["TEX_A"]);

        let plain = root.join("DLC_MOD_Plain");
        std::fs::create_dir_all(plain.as_std_path()).unwrap();
        std::fs::write(plain.join("AutoLoad.ini").as_std_path(), "ModMount = 50\n").unwrap();

        let registry = discover(&root);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn source_with_unreadable_priority_is_skipped() {
        let dir = TempDir::new().unwrap();
        let root = root_path(&dir);
        make_source(&root, "Good", 10, &["TEX_A"]);

        // Has a manifest but no mount descriptor at all.
        let broken = root.join("DLC_MOD_Broken");
        make_source(&root, "Broken", 10, &["TEX_A"]);
        std::fs::remove_file(broken.join("AutoLoad.ini").as_std_path()).unwrap();

        let registry = discover(&root);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.sources()[0].dlc_name, "DLC_MOD_Good");
    }

    #[test]
    fn source_with_corrupt_manifest_is_skipped() {
        let dir = TempDir::new().unwrap();
        let root = root_path(&dir);
        make_source(&root, "Good", 10, &["TEX_A"]);

        let corrupt = root.join("DLC_MOD_Corrupt");
        std::fs::create_dir_all(corrupt.as_std_path()).unwrap();
        std::fs::write(corrupt.join("AutoLoad.ini").as_std_path(), "ModMount = 99\n").unwrap();
        std::fs::write(corrupt.join(MANIFEST_FILE_NAME).as_std_path(), b"garbage").unwrap();

        let registry = discover(&root);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.sources()[0].dlc_name, "DLC_MOD_Good");
    }

    #[test]
    fn mismatched_identity_is_rejected_when_strict() {
        let dir = TempDir::new().unwrap();
        let root = root_path(&dir);
        make_source(&root, "Original", 10, &["TEX_A"]);

        // Simulate copying a pack into a differently named folder.
        std::fs::rename(
            root.join("DLC_MOD_Original").as_std_path(),
            root.join("DLC_MOD_Renamed").as_std_path(),
        )
        .unwrap();

        let strict = discover(&root);
        assert!(strict.is_empty());

        let relaxed = ManifestRegistry::discover(&root, TARGET, IdentityCheck::Relaxed).unwrap();
        assert_eq!(relaxed.len(), 1);
    }

    #[test]
    fn apply_to_rebuilds_on_hit_and_counts_only_misses() {
        let dir = TempDir::new().unwrap();
        let root = root_path(&dir);
        make_source(&root, "Pack", 10, &["TEX_Hit"]);

        let mut registry = discover(&root);
        let oodle = |_: &[u8], _: &mut [u8]| false;

        let mut texture = Texture2d::default();
        assert!(registry.apply_to(&mut texture, "TEX_Hit", &oodle));
        assert_eq!(texture.mips.len(), 1);
        assert_eq!(texture.mips[0].data.as_deref(), Some(&b"Pack"[..]));
        assert_eq!(registry.stats().invocations, 0);

        let mut untouched = Texture2d::default();
        assert!(!registry.apply_to(&mut untouched, "TEX_Miss", &oodle));
        assert!(untouched.mips.is_empty());
        assert_eq!(registry.stats().invocations, 1);
    }

    #[test]
    fn disabled_registry_applies_nothing() {
        let dir = TempDir::new().unwrap();
        let root = root_path(&dir);
        make_source(&root, "Pack", 10, &["TEX_Hit"]);

        let mut registry = discover(&root);
        registry.set_enabled(false);
        assert!(!registry.is_enabled());

        let mut texture = Texture2d::default();
        assert!(!registry.apply_to(&mut texture, "TEX_Hit", &|_: &[u8], _: &mut [u8]| false));
        assert!(!registry.apply_to(&mut texture, "TEX_Miss", &|_: &[u8], _: &mut [u8]| false));
        assert!(texture.mips.is_empty());
        assert_eq!(registry.stats().invocations, 0);

        registry.set_enabled(true);
        assert!(registry.apply_to(&mut texture, "TEX_Hit", &|_: &[u8], _: &mut [u8]| false));
    }

    #[test]
    fn empty_root_discovers_nothing() {
        let dir = TempDir::new().unwrap();
        let registry = discover(&root_path(&dir));
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = TempDir::new().unwrap();
        let missing = root_path(&dir).join("nope");
        assert!(ManifestRegistry::discover(&missing, TARGET, IdentityCheck::Strict).is_err());
    }
}
