//! The preference store.
//!
//! Durable profiles live in memory and are mirrored to a single JSON document
//! after every durable change. Session-only changes live in a separate overlay
//! that is merged over the durable profile on read and never written to disk.
//! Writes for one user are serialized by a per-user mutex; writes to the
//! document are serialized by a file mutex.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use serde::Serialize;
use trailfit_core::{
    normalize_user_id, AppConfig, CategoryPreferences, Direction, FeedbackEntry, FeedbackSignal,
    GeneralPreferences, Location, SignalKind, Sizing, UserProfile,
};

use crate::error::{StoreError, StoreWarning};
use crate::feedback::FeedbackExtractor;
use crate::persist;

/// Feedback entries kept per user; older entries are dropped first.
pub const FEEDBACK_HISTORY_LIMIT: usize = 50;

const BUDGET_STEP_DOWN: f64 = 0.8;
const BUDGET_STEP_UP: f64 = 1.25;

/// Whether feedback-derived budget and brand changes are written to the
/// durable profile or kept for the session only. Color and fit feedback is
/// always durable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedbackPolicy {
    pub budget_permanent: bool,
    pub brand_permanent: bool,
}

impl FeedbackPolicy {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            budget_permanent: config.feedback_budget_permanent,
            brand_permanent: config.feedback_brand_permanent,
        }
    }

    fn is_permanent(self, kind: SignalKind) -> bool {
        match kind {
            SignalKind::Budget => self.budget_permanent,
            SignalKind::Brand => self.brand_permanent,
            SignalKind::Color | SignalKind::Fit => true,
        }
    }
}

/// Sections to merge into a profile. `None` leaves a section untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileUpdate {
    pub sizing: Option<Sizing>,
    pub category_preferences: Option<BTreeMap<String, CategoryPreferences>>,
    pub general: Option<GeneralPreferences>,
    pub location: Option<Location>,
}

impl ProfileUpdate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sizing.is_none()
            && self.category_preferences.is_none()
            && self.general.is_none()
            && self.location.is_none()
    }

    fn apply_to(&self, profile: &mut UserProfile) {
        if let Some(sizing) = &self.sizing {
            profile.sizing.merge_from(sizing);
        }
        if let Some(categories) = &self.category_preferences {
            profile.merge_categories(categories);
        }
        if let Some(general) = &self.general {
            profile.general.merge_from(general);
        }
        if let Some(location) = &self.location {
            profile.location.merge_from(location);
        }
    }
}

/// What the feedback was about, when the caller knows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedbackContext {
    /// Product category the feedback refers to; color feedback lands there.
    pub category: Option<String>,
    /// Typical price of the products the feedback refers to; the basis for
    /// a budget change when neither the text nor the profile gives one.
    pub reference_price: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProfileRead {
    pub profile: UserProfile,
    pub warning: Option<StoreWarning>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identified {
    pub user_id: String,
    pub is_new: bool,
}

pub struct PreferenceStore {
    path: Option<PathBuf>,
    policy: FeedbackPolicy,
    extractor: FeedbackExtractor,
    durable: RwLock<HashMap<String, UserProfile>>,
    session: RwLock<HashMap<String, UserProfile>>,
    user_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    file_lock: Mutex<()>,
    document_warning: RwLock<Option<StoreWarning>>,
    entry_warnings: RwLock<HashMap<String, StoreWarning>>,
}

impl PreferenceStore {
    /// Open the store backed by the document at `path`.
    ///
    /// Never fails. A missing document is an empty store and nothing is
    /// created until the first durable write. A corrupt document or entry is
    /// logged and reported as a warning on subsequent reads.
    pub fn open(
        path: impl Into<PathBuf>,
        policy: FeedbackPolicy,
        extractor: FeedbackExtractor,
    ) -> Self {
        let path = path.into();
        let loaded = persist::load(&path);
        Self {
            path: Some(path),
            policy,
            extractor,
            durable: RwLock::new(loaded.profiles),
            session: RwLock::new(HashMap::new()),
            user_locks: Mutex::new(HashMap::new()),
            file_lock: Mutex::new(()),
            document_warning: RwLock::new(loaded.document_warning),
            entry_warnings: RwLock::new(loaded.entry_warnings),
        }
    }

    /// A store that never touches disk.
    #[must_use]
    pub fn in_memory(policy: FeedbackPolicy, extractor: FeedbackExtractor) -> Self {
        Self {
            path: None,
            policy,
            extractor,
            durable: RwLock::new(HashMap::new()),
            session: RwLock::new(HashMap::new()),
            user_locks: Mutex::new(HashMap::new()),
            file_lock: Mutex::new(()),
            document_warning: RwLock::new(None),
            entry_warnings: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The extractor `record_feedback` uses, for callers that need to tell
    /// feedback apart from a new request.
    #[must_use]
    pub fn extractor(&self) -> &FeedbackExtractor {
        &self.extractor
    }

    #[must_use]
    pub fn exists(&self, user_id: &str) -> bool {
        let id = normalize_user_id(user_id);
        read(&self.durable).contains_key(&id) || read(&self.session).contains_key(&id)
    }

    /// Mark a user as seen, creating their profile on first identification.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidUserId`] for a blank id; [`StoreError::Persist`]
    /// if the document cannot be written (the change is rolled back).
    pub fn identify(&self, user_id: &str) -> Result<Identified, StoreError> {
        let id = valid_id(user_id)?;
        let user_lock = self.user_lock(&id);
        let _guard = lock(&user_lock);

        let now = Utc::now();
        let previous = read(&self.durable).get(&id).cloned();
        let is_new = previous.is_none();
        let mut profile = previous.clone().unwrap_or_else(|| UserProfile::new(now));
        profile.touch(now);
        self.commit(&id, previous, profile)?;

        if is_new {
            tracing::info!(user = %id, "new user profile created");
        }
        Ok(Identified {
            user_id: id,
            is_new,
        })
    }

    /// The effective profile: durable sections with session overrides on top.
    /// Unknown users get an empty profile. Never fails; storage problems come
    /// back as `warning`.
    #[must_use]
    pub fn get(&self, user_id: &str) -> ProfileRead {
        let id = normalize_user_id(user_id);
        let warning = read(&self.entry_warnings)
            .get(&id)
            .cloned()
            .or_else(|| read(&self.document_warning).clone());
        if let Some(warning) = &warning {
            tracing::warn!(user = %id, warning = %warning, "degraded preference read");
        }
        ProfileRead {
            profile: self.effective(&id),
            warning,
        }
    }

    /// Merge the supplied sections into the user's profile and return the
    /// effective result.
    ///
    /// With `permanent = false` the sections go to the session overlay only
    /// and nothing is written to disk.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidUserId`] for a blank id; [`StoreError::Persist`]
    /// if the document cannot be written (the change is rolled back).
    pub fn save(
        &self,
        user_id: &str,
        update: &ProfileUpdate,
        permanent: bool,
    ) -> Result<UserProfile, StoreError> {
        let id = valid_id(user_id)?;
        let user_lock = self.user_lock(&id);
        let _guard = lock(&user_lock);

        if permanent {
            let now = Utc::now();
            let previous = read(&self.durable).get(&id).cloned();
            let mut profile = previous.clone().unwrap_or_else(|| UserProfile::new(now));
            update.apply_to(&mut profile);
            profile.touch(now);
            self.commit(&id, previous, profile)?;
        } else {
            let mut session = write(&self.session);
            let overlay = session.entry(id.clone()).or_insert_with(UserProfile::empty);
            update.apply_to(overlay);
        }

        tracing::debug!(user = %id, permanent, "preferences saved");
        Ok(self.effective(&id))
    }

    /// Extract signals from `text`, append them to the user's feedback
    /// history, and fold them into preferences per the [`FeedbackPolicy`].
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidUserId`] for a blank id; [`StoreError::Persist`]
    /// if the document cannot be written. On failure neither the durable
    /// profile nor the session overlay changes.
    pub fn record_feedback(
        &self,
        user_id: &str,
        text: &str,
        context: &FeedbackContext,
    ) -> Result<Vec<FeedbackSignal>, StoreError> {
        let id = valid_id(user_id)?;
        let signals = self.extractor.extract(text);

        let user_lock = self.user_lock(&id);
        let _guard = lock(&user_lock);

        let now = Utc::now();
        let previous_durable = read(&self.durable).get(&id).cloned();
        let previous_overlay = read(&self.session).get(&id).cloned();
        let mut durable = previous_durable
            .clone()
            .unwrap_or_else(|| UserProfile::new(now));
        let mut overlay = previous_overlay.clone().unwrap_or_else(UserProfile::empty);

        for signal in &signals {
            let mut view = durable.clone();
            layer(&mut view, &overlay);
            let Some(change) = resolve_signal(&view, signal, context) else {
                continue;
            };
            if self.policy.is_permanent(signal.kind) {
                apply_durable(&mut durable, &mut overlay, &change);
            } else {
                apply_session(&mut overlay, &view, &change);
            }
        }

        durable.feedback_history.push(FeedbackEntry {
            text: text.trim().to_owned(),
            context: context.category.clone(),
            signals: signals.clone(),
            timestamp: now,
        });
        let len = durable.feedback_history.len();
        if len > FEEDBACK_HISTORY_LIMIT {
            durable
                .feedback_history
                .drain(..len - FEEDBACK_HISTORY_LIMIT);
        }
        durable.touch(now);

        write(&self.session).insert(id.clone(), overlay);
        if let Err(e) = self.commit(&id, previous_durable, durable) {
            let mut session = write(&self.session);
            match previous_overlay {
                Some(previous) => {
                    session.insert(id, previous);
                }
                None => {
                    session.remove(&id);
                }
            }
            return Err(e);
        }

        Ok(signals)
    }

    /// Wipe every profile, durable and session, and the document with them.
    ///
    /// # Errors
    ///
    /// [`StoreError::Persist`] if the emptied document cannot be written.
    pub fn reset_all(&self) -> Result<(), StoreError> {
        write(&self.durable).clear();
        write(&self.session).clear();
        write(&self.entry_warnings).clear();
        self.persist()?;
        tracing::info!("all preference profiles reset");
        Ok(())
    }

    /// Remove one user entirely. Returns whether the user existed.
    ///
    /// # Errors
    ///
    /// [`StoreError::Persist`] if the document cannot be written (the user is
    /// restored).
    pub fn delete_user(&self, user_id: &str) -> Result<bool, StoreError> {
        let id = normalize_user_id(user_id);
        let user_lock = self.user_lock(&id);
        let _guard = lock(&user_lock);

        let removed = write(&self.durable).remove(&id);
        let overlay = write(&self.session).remove(&id);
        write(&self.entry_warnings).remove(&id);

        let Some(previous) = removed else {
            return Ok(overlay.is_some());
        };
        if let Err(e) = self.persist() {
            write(&self.durable).insert(id.clone(), previous);
            if let Some(overlay) = overlay {
                write(&self.session).insert(id, overlay);
            }
            return Err(e);
        }
        Ok(true)
    }

    /// Normalized ids of every durable profile, sorted.
    #[must_use]
    pub fn list_users(&self) -> Vec<String> {
        let mut users: Vec<String> = read(&self.durable).keys().cloned().collect();
        users.sort();
        users
    }

    /// Drop the user's session-only overrides.
    pub fn clear_session(&self, user_id: &str) {
        let id = normalize_user_id(user_id);
        write(&self.session).remove(&id);
    }

    /// One-line, human-readable summary of the user's effective preferences.
    #[must_use]
    pub fn summary(&self, user_id: &str) -> String {
        summarize(&self.effective(&normalize_user_id(user_id)))
    }

    fn effective(&self, id: &str) -> UserProfile {
        let mut profile = read(&self.durable).get(id).cloned().unwrap_or_default();
        if let Some(overlay) = read(&self.session).get(id) {
            layer(&mut profile, overlay);
        }
        profile
    }

    fn user_lock(&self, id: &str) -> Arc<Mutex<()>> {
        Arc::clone(lock(&self.user_locks).entry(id.to_owned()).or_default())
    }

    /// Install `updated` as the user's durable profile and persist. On failure
    /// the previous profile is restored.
    fn commit(
        &self,
        id: &str,
        previous: Option<UserProfile>,
        updated: UserProfile,
    ) -> Result<(), StoreError> {
        write(&self.durable).insert(id.to_owned(), updated);
        if let Err(e) = self.persist() {
            let mut durable = write(&self.durable);
            match previous {
                Some(previous) => {
                    durable.insert(id.to_owned(), previous);
                }
                None => {
                    durable.remove(id);
                }
            }
            tracing::warn!(user = %id, error = %e, "preference save failed, change rolled back");
            return Err(e);
        }
        write(&self.entry_warnings).remove(id);
        Ok(())
    }

    fn persist(&self) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let _file = lock(&self.file_lock);

        let corrupt = matches!(
            *read(&self.document_warning),
            Some(StoreWarning::CorruptDocument { .. })
        );
        if corrupt {
            persist::back_up_corrupt(path);
        }

        let snapshot = read(&self.durable).clone();
        persist::write(path, &snapshot)?;
        *write(&self.document_warning) = None;
        Ok(())
    }
}

/// A feedback signal resolved against the effective profile.
#[derive(Debug, Clone, PartialEq)]
enum Change {
    Budget(f64),
    Fit(String),
    /// Color preference for one category, or the general section when
    /// `category` is `None`.
    Color {
        category: Option<String>,
        value: String,
        avoid: bool,
    },
    Brand {
        value: String,
        avoid: bool,
    },
}

/// Turn one signal into a concrete change. Returns `None` when the signal
/// carries nothing actionable (e.g. "too cheap" with no budget).
fn resolve_signal(
    view: &UserProfile,
    signal: &FeedbackSignal,
    context: &FeedbackContext,
) -> Option<Change> {
    let category = context
        .category
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_lowercase);

    match (signal.kind, signal.direction) {
        (SignalKind::Budget, Direction::Lower) => {
            let ceiling = signal
                .value
                .as_deref()
                .and_then(|v| v.parse::<f64>().ok())
                .or_else(|| view.general.budget_max.map(|b| b * BUDGET_STEP_DOWN))
                .or_else(|| context.reference_price.map(|p| p * BUDGET_STEP_DOWN))?;
            Some(Change::Budget(round_cents(ceiling)))
        }
        (SignalKind::Budget, Direction::Raise) => {
            let current = view.general.budget_max?;
            Some(Change::Budget(round_cents(current * BUDGET_STEP_UP)))
        }
        (SignalKind::Color, direction @ (Direction::Avoid | Direction::Prefer)) => {
            Some(Change::Color {
                category,
                value: signal.value.clone()?,
                avoid: direction == Direction::Avoid,
            })
        }
        (SignalKind::Fit, _) => Some(Change::Fit(signal.value.clone()?)),
        (SignalKind::Brand, direction @ (Direction::Avoid | Direction::Prefer)) => {
            Some(Change::Brand {
                value: signal.value.clone()?,
                avoid: direction == Direction::Avoid,
            })
        }
        _ => None,
    }
}

/// Write a permanent change into the durable profile, then bring the session
/// overlay in line so it does not hide the new value: overridden scalars are
/// dropped, lists the overlay carries get the same edit.
fn apply_durable(durable: &mut UserProfile, overlay: &mut UserProfile, change: &Change) {
    match change {
        Change::Budget(ceiling) => {
            durable.general.budget_max = Some(*ceiling);
            overlay.general.budget_max = None;
        }
        Change::Fit(fit) => {
            durable.sizing.fit = Some(fit.clone());
            overlay.sizing.fit = None;
        }
        Change::Color { value, avoid, .. } | Change::Brand { value, avoid } => {
            if let Some((prefer_list, avoid_list)) = lists_mut(durable, change, true) {
                edit_lists(prefer_list, avoid_list, value, *avoid, false);
            }
            if let Some((prefer_list, avoid_list)) = lists_mut(overlay, change, false) {
                edit_lists(prefer_list, avoid_list, value, *avoid, true);
            }
        }
    }
}

/// Write a session-only change into the overlay. Lists start from the
/// effective values so inherited entries are not lost.
fn apply_session(overlay: &mut UserProfile, view: &UserProfile, change: &Change) {
    match change {
        Change::Budget(ceiling) => overlay.general.budget_max = Some(*ceiling),
        Change::Fit(fit) => overlay.sizing.fit = Some(fit.clone()),
        Change::Color { value, avoid, .. } | Change::Brand { value, avoid } => {
            let (prefer_now, avoid_now) = current_lists(view, change);
            if let Some((prefer_list, avoid_list)) = lists_mut(overlay, change, true) {
                if prefer_list.is_empty() {
                    *prefer_list = prefer_now;
                }
                if avoid_list.is_empty() {
                    *avoid_list = avoid_now;
                }
                edit_lists(prefer_list, avoid_list, value, *avoid, false);
            }
        }
    }
}

/// The (prefer, avoid) lists a color or brand change edits. Missing category
/// entries are created only when `create` is set.
fn lists_mut<'a>(
    profile: &'a mut UserProfile,
    change: &Change,
    create: bool,
) -> Option<(&'a mut Vec<String>, &'a mut Vec<String>)> {
    match change {
        Change::Color {
            category: Some(category),
            ..
        } => {
            let prefs = if create {
                Some(profile.category_mut(category))
            } else {
                profile.category_preferences.get_mut(category.as_str())
            };
            prefs.map(|p| (&mut p.colors, &mut p.avoid_colors))
        }
        Change::Color { category: None, .. } => Some((
            &mut profile.general.colors,
            &mut profile.general.avoid_colors,
        )),
        Change::Brand { .. } => Some((
            &mut profile.general.brands_liked,
            &mut profile.general.brands_avoided,
        )),
        Change::Budget(_) | Change::Fit(_) => None,
    }
}

fn current_lists(profile: &UserProfile, change: &Change) -> (Vec<String>, Vec<String>) {
    match change {
        Change::Color {
            category: Some(category),
            ..
        } => profile
            .category(category)
            .map(|p| (p.colors.clone(), p.avoid_colors.clone()))
            .unwrap_or_default(),
        Change::Color { category: None, .. } => (
            profile.general.colors.clone(),
            profile.general.avoid_colors.clone(),
        ),
        Change::Brand { .. } => (
            profile.general.brands_liked.clone(),
            profile.general.brands_avoided.clone(),
        ),
        Change::Budget(_) | Change::Fit(_) => (Vec::new(), Vec::new()),
    }
}

/// Move `value` onto the avoid list (or the prefer list) and off the other.
/// With `carried_only`, empty lists are left empty so an overlay keeps
/// inheriting them.
fn edit_lists(
    prefer_list: &mut Vec<String>,
    avoid_list: &mut Vec<String>,
    value: &str,
    avoid: bool,
    carried_only: bool,
) {
    let (add_to, remove_from, removed) = if avoid {
        (avoid_list, prefer_list, value)
    } else if value == "colorful" {
        // "colorful" lifts an earlier bright-color avoidance.
        (prefer_list, avoid_list, "bright")
    } else {
        (prefer_list, avoid_list, value)
    };
    if !carried_only || !add_to.is_empty() {
        add_unique(add_to, value);
    }
    if !carried_only || !remove_from.is_empty() {
        remove_ci(remove_from, removed);
    }
}

/// Merge session overrides over a durable profile, section by section.
fn layer(profile: &mut UserProfile, overlay: &UserProfile) {
    profile.sizing.merge_from(&overlay.sizing);
    profile.merge_categories(&overlay.category_preferences);
    profile.general.merge_from(&overlay.general);
    profile.location.merge_from(&overlay.location);
}

fn summarize(profile: &UserProfile) -> String {
    let mut parts = Vec::new();
    if let Some(fit) = &profile.sizing.fit {
        parts.push(format!("prefers a {fit} fit"));
    }
    if let Some(size) = &profile.sizing.size {
        parts.push(format!("wears size {size}"));
    }
    if let Some(shoe) = &profile.sizing.shoe_size {
        parts.push(format!("shoe size {shoe}"));
    }
    for (category, prefs) in &profile.category_preferences {
        if !prefs.colors.is_empty() {
            parts.push(format!("likes {} for {category}", prefs.colors.join(", ")));
        }
        if !prefs.avoid_colors.is_empty() {
            parts.push(format!(
                "avoids {} colors for {category}",
                prefs.avoid_colors.join(", ")
            ));
        }
    }
    let general = &profile.general;
    if !general.colors.is_empty() {
        parts.push(format!("likes {}", general.colors.join(", ")));
    }
    if !general.avoid_colors.is_empty() {
        parts.push(format!("avoids {} colors", general.avoid_colors.join(", ")));
    }
    if let Some(budget) = general.budget_max {
        parts.push(format!("budget up to ${budget:.0}"));
    }
    if !general.brands_liked.is_empty() {
        parts.push(format!("likes {}", general.brands_liked.join(", ")));
    }
    if !general.brands_avoided.is_empty() {
        parts.push(format!("avoids {}", general.brands_avoided.join(", ")));
    }
    let location = &profile.location;
    if let Some(place) = location.city.as_ref().or(location.region.as_ref()) {
        match location.climate {
            Some(climate) => parts.push(format!("based in {place} ({climate} climate)")),
            None => parts.push(format!("based in {place}")),
        }
    }

    if parts.is_empty() {
        "no saved preferences".to_owned()
    } else {
        parts.join("; ")
    }
}

fn add_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v.eq_ignore_ascii_case(value)) {
        list.push(value.to_owned());
    }
}

fn remove_ci(list: &mut Vec<String>, value: &str) {
    list.retain(|v| !v.eq_ignore_ascii_case(value));
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn valid_id(user_id: &str) -> Result<String, StoreError> {
    let id = normalize_user_id(user_id);
    if id.is_empty() {
        return Err(StoreError::InvalidUserId(user_id.to_owned()));
    }
    Ok(id)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
