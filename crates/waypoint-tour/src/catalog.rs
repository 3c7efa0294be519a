#![forbid(unsafe_code)]

//! Step catalog.
//!
//! Steps are declared as static tables ([`StepSpec`]) grouped by audience.
//! [`build_steps`] composes the groups for a [`Capabilities`] set and resolves
//! their text through a [`Translate`] implementation. [`StepCatalog`] memoizes
//! the result on `(capabilities, translation identity)`.
//!
//! # Invariants
//!
//! 1. Group order is fixed: base, manager, admin, completion.
//! 2. Exactly one step is terminal; it is last, has no target, and no action.
//! 3. Step ids are unique within a catalog.

use std::rc::Rc;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use waypoint_runtime::i18n::{Translate, TranslationId};

bitflags! {
    /// Role flags supplied by the host for the signed-in user.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RoleFlags: u8 {
        /// Approves access requests.
        const MANAGER = 0b01;
        /// Administers users and systems.
        const ADMIN   = 0b10;
    }
}

/// The signed-in user as seen by the tour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserDescriptor {
    /// Stable id; keys persisted progress.
    pub id: String,
    /// `None` when the host has no role data; treated as least-privileged.
    pub roles: Option<RoleFlags>,
}

impl UserDescriptor {
    #[must_use]
    pub fn new(id: impl Into<String>, roles: Option<RoleFlags>) -> Self {
        Self {
            id: id.into(),
            roles,
        }
    }

    #[must_use]
    pub fn capabilities(&self) -> Capabilities {
        Capabilities::from_roles(self.roles)
    }
}

/// Which optional step groups a user sees. Manager and admin are independent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Capabilities {
    pub is_manager: bool,
    pub is_admin: bool,
}

impl Capabilities {
    /// Least-privileged capabilities: base steps only.
    pub const NONE: Self = Self {
        is_manager: false,
        is_admin: false,
    };

    #[must_use]
    pub const fn new(is_manager: bool, is_admin: bool) -> Self {
        Self {
            is_manager,
            is_admin,
        }
    }

    #[must_use]
    pub fn from_roles(roles: Option<RoleFlags>) -> Self {
        let roles = roles.unwrap_or_default();
        Self {
            is_manager: roles.contains(RoleFlags::MANAGER),
            is_admin: roles.contains(RoleFlags::ADMIN),
        }
    }
}

/// What completes a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepAction {
    /// Next button or keyboard.
    None,
    /// Only a click on the real anchor control.
    ClickAdvance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepGroup {
    Base,
    Manager,
    Admin,
    Completion,
}

/// Declarative step definition with untranslated text keys.
#[derive(Debug, Clone, Copy)]
pub struct StepSpec {
    pub id: &'static str,
    pub route_path: Option<&'static str>,
    pub target_selector: Option<&'static str>,
    pub title_key: &'static str,
    pub description_key: &'static str,
    pub icon: &'static str,
    pub action: StepAction,
    pub next_route: Option<&'static str>,
}

impl StepSpec {
    const fn pointer(
        id: &'static str,
        route: &'static str,
        target: &'static str,
        title_key: &'static str,
        description_key: &'static str,
        icon: &'static str,
    ) -> Self {
        Self {
            id,
            route_path: Some(route),
            target_selector: Some(target),
            title_key,
            description_key,
            icon,
            action: StepAction::None,
            next_route: None,
        }
    }

    const fn click_through(mut self, next_route: &'static str) -> Self {
        self.action = StepAction::ClickAdvance;
        self.next_route = Some(next_route);
        self
    }
}

pub const BASE_STEPS: [StepSpec; 7] = [
    StepSpec {
        id: "welcome",
        route_path: Some("/"),
        target_selector: None,
        title_key: "tourStepWelcome",
        description_key: "tourStepWelcomeDesc",
        icon: "wave",
        action: StepAction::None,
        next_route: None,
    },
    StepSpec::pointer(
        "create-request",
        "/",
        "[data-tour=\"new-request\"]",
        "tourStepCreateBtn",
        "tourStepCreateBtnDesc",
        "plus",
    )
    .click_through("/create-request"),
    StepSpec::pointer(
        "user-search",
        "/create-request",
        "[data-tour=\"user-search\"]",
        "tourStepSelectUser",
        "tourStepSelectUserDesc",
        "user",
    ),
    StepSpec::pointer(
        "system-select",
        "/create-request",
        "[data-tour=\"system-select\"]",
        "tourStepSelectSystem",
        "tourStepSelectSystemDesc",
        "server",
    ),
    StepSpec::pointer(
        "role-select",
        "/create-request",
        "[data-tour=\"role-select\"]",
        "tourStepSelectRole",
        "tourStepSelectRoleDesc",
        "key",
    ),
    StepSpec::pointer(
        "justification",
        "/create-request",
        "[data-tour=\"justification\"]",
        "tourStepJustification",
        "tourStepJustificationDesc",
        "pencil",
    ),
    StepSpec::pointer(
        "my-requests",
        "/",
        "[data-tour=\"my-requests\"]",
        "tourStepMyRequests",
        "tourStepMyRequestsDesc",
        "list",
    ),
];

pub const MANAGER_STEPS: [StepSpec; 1] = [StepSpec::pointer(
    "approvals",
    "/",
    "[data-tour=\"pending-approvals\"]",
    "tourStepApprovals",
    "tourStepApprovalsDesc",
    "check",
)];

pub const ADMIN_STEPS: [StepSpec; 3] = [
    StepSpec::pointer(
        "admin-entry",
        "/",
        "[data-tour=\"admin-link\"]",
        "tourStepAdmin",
        "tourStepAdminDesc",
        "settings",
    )
    .click_through("/admin"),
    StepSpec::pointer(
        "admin-users",
        "/admin",
        "[data-tour=\"admin-users\"]",
        "tourStepAdminUsers",
        "tourStepAdminUsersDesc",
        "users",
    ),
    StepSpec::pointer(
        "admin-systems",
        "/admin",
        "[data-tour=\"admin-systems\"]",
        "tourStepAdminSystems",
        "tourStepAdminSystemsDesc",
        "database",
    ),
];

pub const COMPLETE_STEP: StepSpec = StepSpec {
    id: "complete",
    route_path: None,
    target_selector: None,
    title_key: "tourStepComplete",
    description_key: "tourStepCompleteDesc",
    icon: "flag",
    action: StepAction::None,
    next_route: None,
};

/// One resolved tour step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TourStep {
    pub id: &'static str,
    pub route_path: Option<&'static str>,
    /// `None` renders as a centered modal.
    pub target_selector: Option<&'static str>,
    pub title: String,
    pub description: String,
    pub icon: &'static str,
    pub action: StepAction,
    /// Route to open after a click-advance step fires.
    pub next_route: Option<&'static str>,
    pub is_terminal: bool,
    pub group: StepGroup,
}

impl TourStep {
    fn from_spec(spec: &StepSpec, group: StepGroup, tr: &dyn Translate) -> Self {
        Self {
            id: spec.id,
            route_path: spec.route_path,
            target_selector: spec.target_selector,
            title: tr.translate(spec.title_key),
            description: tr.translate(spec.description_key),
            icon: spec.icon,
            action: spec.action,
            next_route: spec.next_route,
            is_terminal: group == StepGroup::Completion,
            group,
        }
    }

    #[must_use]
    pub fn is_click_advance(&self) -> bool {
        self.action == StepAction::ClickAdvance
    }
}

/// Compose the ordered step list for `caps`, resolving text through `tr`.
#[must_use]
pub fn build_steps(caps: Capabilities, tr: &dyn Translate) -> Vec<TourStep> {
    let mut groups: Vec<(StepGroup, &[StepSpec])> = vec![(StepGroup::Base, &BASE_STEPS)];
    if caps.is_manager {
        groups.push((StepGroup::Manager, &MANAGER_STEPS));
    }
    if caps.is_admin {
        groups.push((StepGroup::Admin, &ADMIN_STEPS));
    }
    groups.push((StepGroup::Completion, std::slice::from_ref(&COMPLETE_STEP)));

    groups
        .into_iter()
        .flat_map(|(group, specs)| specs.iter().map(move |spec| (group, spec)))
        .map(|(group, spec)| TourStep::from_spec(spec, group, tr))
        .collect()
}

/// Memoized [`build_steps`].
#[derive(Debug, Default)]
pub struct StepCatalog {
    key: Option<(Capabilities, TranslationId)>,
    steps: Rc<[TourStep]>,
}

impl StepCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self {
            key: None,
            steps: Rc::from(Vec::new()),
        }
    }

    /// Steps for `caps` under the translator's current strings.
    ///
    /// Rebuilds only when the capabilities or the translation identity changed.
    pub fn steps(&mut self, caps: Capabilities, tr: &dyn Translate) -> Rc<[TourStep]> {
        let identity = tr.identity();
        let fresh = matches!(&self.key, Some((c, id)) if *c == caps && *id == identity);
        if !fresh {
            tracing::debug!(
                is_manager = caps.is_manager,
                is_admin = caps.is_admin,
                locale = %identity.locale,
                "rebuilding step catalog"
            );
            self.steps = Rc::from(build_steps(caps, tr));
            self.key = Some((caps, identity));
        }
        Rc::clone(&self.steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::cell::Cell;
    use std::collections::HashSet;

    /// Echoes keys and counts lookups.
    struct KeyEcho {
        locale: &'static str,
        lookups: Cell<usize>,
    }

    impl KeyEcho {
        fn new(locale: &'static str) -> Self {
            Self {
                locale,
                lookups: Cell::new(0),
            }
        }
    }

    impl Translate for KeyEcho {
        fn translate(&self, key: &str) -> String {
            self.lookups.set(self.lookups.get() + 1);
            format!("{}:{key}", self.locale)
        }

        fn identity(&self) -> TranslationId {
            TranslationId {
                locale: self.locale.to_string(),
                revision: 0,
            }
        }
    }

    fn ids(steps: &[TourStep]) -> Vec<&'static str> {
        steps.iter().map(|s| s.id).collect()
    }

    #[test]
    fn base_only_has_eight_steps() {
        let steps = build_steps(Capabilities::NONE, &KeyEcho::new("en"));
        assert_eq!(steps.len(), 8);
        assert!(steps[7].is_terminal);
        assert_eq!(steps[7].id, "complete");
        assert_eq!(
            ids(&steps[..7]),
            vec![
                "welcome",
                "create-request",
                "user-search",
                "system-select",
                "role-select",
                "justification",
                "my-requests"
            ]
        );
    }

    #[test]
    fn manager_and_admin_have_twelve_steps_in_group_order() {
        let steps = build_steps(Capabilities::new(true, true), &KeyEcho::new("en"));
        assert_eq!(steps.len(), 12);
        let groups: Vec<_> = steps.iter().map(|s| s.group).collect();
        assert_eq!(groups[..7], [StepGroup::Base; 7]);
        assert_eq!(groups[7], StepGroup::Manager);
        assert_eq!(groups[8..11], [StepGroup::Admin; 3]);
        assert_eq!(groups[11], StepGroup::Completion);
        assert_eq!(
            ids(&steps[7..11]),
            vec!["approvals", "admin-entry", "admin-users", "admin-systems"]
        );
    }

    #[test]
    fn admin_without_manager_skips_manager_group() {
        let steps = build_steps(Capabilities::new(false, true), &KeyEcho::new("en"));
        assert_eq!(steps.len(), 11);
        assert!(steps.iter().all(|s| s.group != StepGroup::Manager));
    }

    #[test]
    fn missing_roles_are_least_privileged() {
        assert_eq!(Capabilities::from_roles(None), Capabilities::NONE);
        let user = UserDescriptor::new("7", Some(RoleFlags::MANAGER | RoleFlags::ADMIN));
        assert_eq!(user.capabilities(), Capabilities::new(true, true));
    }

    #[test]
    fn text_is_resolved_through_translator() {
        let steps = build_steps(Capabilities::NONE, &KeyEcho::new("ru"));
        assert_eq!(steps[0].title, "ru:tourStepWelcome");
        assert_eq!(steps[0].description, "ru:tourStepWelcomeDesc");
    }

    #[test]
    fn click_advance_steps_name_their_next_route() {
        let steps = build_steps(Capabilities::new(true, true), &KeyEcho::new("en"));
        for step in steps.iter().filter(|s| s.is_click_advance()) {
            assert!(step.target_selector.is_some(), "{}", step.id);
            assert!(step.next_route.is_some(), "{}", step.id);
        }
    }

    #[test]
    fn catalog_memoizes_until_inputs_change() {
        let mut catalog = StepCatalog::new();
        let en = KeyEcho::new("en");
        let a = catalog.steps(Capabilities::NONE, &en);
        let lookups = en.lookups.get();
        let b = catalog.steps(Capabilities::NONE, &en);
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(en.lookups.get(), lookups);

        let c = catalog.steps(Capabilities::new(true, false), &en);
        assert_eq!(c.len(), 9);

        let ru = KeyEcho::new("ru");
        let d = catalog.steps(Capabilities::new(true, false), &ru);
        assert!(!Rc::ptr_eq(&c, &d));
        assert_eq!(d[0].title, "ru:tourStepWelcome");
    }

    proptest! {
        #[test]
        fn every_capability_set_has_one_trailing_terminal(is_manager: bool, is_admin: bool) {
            let steps = build_steps(Capabilities::new(is_manager, is_admin), &KeyEcho::new("en"));
            let terminals: Vec<_> = steps.iter().enumerate().filter(|(_, s)| s.is_terminal).collect();
            prop_assert_eq!(terminals.len(), 1);
            let (index, terminal) = terminals[0];
            prop_assert_eq!(index, steps.len() - 1);
            prop_assert!(terminal.target_selector.is_none());
            prop_assert_eq!(terminal.action, StepAction::None);

            let unique: HashSet<_> = steps.iter().map(|s| s.id).collect();
            prop_assert_eq!(unique.len(), steps.len());

            let expected = 8 + usize::from(is_manager) + 3 * usize::from(is_admin);
            prop_assert_eq!(steps.len(), expected);
        }
    }
}
