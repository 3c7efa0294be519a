#![forbid(unsafe_code)]

//! Built-in tour strings (English and Russian).

use waypoint_runtime::i18n::StringCatalog;
use waypoint_runtime::locale::LocaleContext;

const EN: &[(&str, &str)] = &[
    ("tourStepWelcome", "Welcome aboard"),
    (
        "tourStepWelcomeDesc",
        "This short tour shows how to request access to a system and track your requests.",
    ),
    ("tourStepCreateBtn", "Create a request"),
    (
        "tourStepCreateBtnDesc",
        "Click this button to open the access request form.",
    ),
    ("tourStepSelectUser", "Choose the user"),
    (
        "tourStepSelectUserDesc",
        "Search for the employee who needs access. It can be you.",
    ),
    ("tourStepSelectSystem", "Choose the system"),
    (
        "tourStepSelectSystemDesc",
        "Pick the system the access is requested for.",
    ),
    ("tourStepSelectRole", "Choose the role"),
    (
        "tourStepSelectRoleDesc",
        "Roles define what the user will be allowed to do in the system.",
    ),
    ("tourStepJustification", "Explain why"),
    (
        "tourStepJustificationDesc",
        "A short justification helps approvers decide faster.",
    ),
    ("tourStepMyRequests", "My requests"),
    (
        "tourStepMyRequestsDesc",
        "Every request you submit appears here with its current status.",
    ),
    ("tourStepApprovals", "Pending approvals"),
    (
        "tourStepApprovalsDesc",
        "Requests waiting for your decision as a manager are listed here.",
    ),
    ("tourStepAdmin", "Administration"),
    (
        "tourStepAdminDesc",
        "Click here to open the administration area.",
    ),
    ("tourStepAdminUsers", "Users"),
    ("tourStepAdminUsersDesc", "Manage user accounts and their roles."),
    ("tourStepAdminSystems", "Systems"),
    (
        "tourStepAdminSystemsDesc",
        "Register systems and configure the roles they offer.",
    ),
    ("tourStepComplete", "You are all set"),
    (
        "tourStepCompleteDesc",
        "You can replay this tour at any time from your profile menu.",
    ),
    ("tourClickHere", "Click the highlighted element to continue"),
    ("tourSkip", "Skip tour"),
    ("tourFinish", "Finish"),
    ("previous", "Back"),
    ("next", "Next"),
];

const RU: &[(&str, &str)] = &[
    ("tourStepWelcome", "Добро пожаловать"),
    (
        "tourStepWelcomeDesc",
        "Короткий тур покажет, как запросить доступ к системе и отслеживать заявки.",
    ),
    ("tourStepCreateBtn", "Создание заявки"),
    (
        "tourStepCreateBtnDesc",
        "Нажмите эту кнопку, чтобы открыть форму заявки на доступ.",
    ),
    ("tourStepSelectUser", "Выбор пользователя"),
    (
        "tourStepSelectUserDesc",
        "Найдите сотрудника, которому нужен доступ. Это можете быть вы.",
    ),
    ("tourStepSelectSystem", "Выбор системы"),
    (
        "tourStepSelectSystemDesc",
        "Выберите систему, к которой запрашивается доступ.",
    ),
    ("tourStepSelectRole", "Выбор роли"),
    (
        "tourStepSelectRoleDesc",
        "Роль определяет, что пользователь сможет делать в системе.",
    ),
    ("tourStepJustification", "Обоснование"),
    (
        "tourStepJustificationDesc",
        "Короткое обоснование помогает согласующим быстрее принять решение.",
    ),
    ("tourStepMyRequests", "Мои заявки"),
    (
        "tourStepMyRequestsDesc",
        "Здесь отображаются все ваши заявки и их текущий статус.",
    ),
    ("tourStepApprovals", "Ожидают согласования"),
    (
        "tourStepApprovalsDesc",
        "Заявки, ожидающие вашего решения как руководителя.",
    ),
    ("tourStepAdmin", "Администрирование"),
    (
        "tourStepAdminDesc",
        "Нажмите, чтобы перейти в раздел администрирования.",
    ),
    ("tourStepAdminUsers", "Пользователи"),
    (
        "tourStepAdminUsersDesc",
        "Управление учётными записями и их ролями.",
    ),
    ("tourStepAdminSystems", "Системы"),
    (
        "tourStepAdminSystemsDesc",
        "Регистрация систем и настройка доступных ролей.",
    ),
    ("tourStepComplete", "Готово"),
    (
        "tourStepCompleteDesc",
        "Тур можно пройти повторно в любой момент из меню профиля.",
    ),
    ("tourClickHere", "Нажмите на выделенный элемент, чтобы продолжить"),
    ("tourSkip", "Пропустить тур"),
    ("tourFinish", "Завершить"),
    ("previous", "Назад"),
    ("next", "Далее"),
];

/// A [`StringCatalog`] following `locale`, preloaded with the tour strings.
#[must_use]
pub fn builtin_catalog(locale: LocaleContext) -> StringCatalog {
    let catalog = StringCatalog::new(locale);
    catalog.insert("en", EN.iter().copied());
    catalog.insert("ru", RU.iter().copied());
    catalog
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{
        ADMIN_STEPS, BASE_STEPS, COMPLETE_STEP, Capabilities, MANAGER_STEPS, build_steps,
    };
    use std::collections::HashSet;
    use waypoint_runtime::i18n::Translate;

    #[test]
    fn every_step_key_is_translated_in_both_locales() {
        let specs = BASE_STEPS
            .iter()
            .chain(&MANAGER_STEPS)
            .chain(&ADMIN_STEPS)
            .chain(std::iter::once(&COMPLETE_STEP));
        for table in [EN, RU] {
            let keys: HashSet<_> = table.iter().map(|(k, _)| *k).collect();
            for spec in specs.clone() {
                assert!(keys.contains(spec.title_key), "{}", spec.title_key);
                assert!(keys.contains(spec.description_key), "{}", spec.description_key);
            }
        }
        assert_eq!(EN.len(), RU.len());
    }

    #[test]
    fn catalog_switches_language_with_context() {
        let ctx = LocaleContext::new("en");
        let catalog = builtin_catalog(ctx.clone());
        let en = build_steps(Capabilities::NONE, &catalog);
        assert_eq!(en[0].title, "Welcome aboard");

        ctx.set_locale("ru-RU");
        let ru = build_steps(Capabilities::NONE, &catalog);
        assert_eq!(ru[0].title, "Добро пожаловать");
        assert_eq!(catalog.translate("tourFinish"), "Завершить");
    }
}
