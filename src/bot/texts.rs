//! Message rendering. Pure functions over engine projections.

use engine::{DayStatistics, FullReport, UserAttendance, UserStatistics};
use model::entities::user;

use super::conversation::RegistrationStep;

/// Longest message the bot sends in one piece, in characters.
pub const MAX_MESSAGE_CHARS: usize = 4000;

/// How many participants the admin "users" view lists.
pub const PARTICIPANTS_PREVIEW: usize = 20;

pub const NOT_REGISTERED: &str = "❌ Вы не зарегистрированы. Отправьте /start для регистрации.";
pub const NO_ACTIVE_DAY: &str = "⏳ Сейчас нет активного дня. Попробуйте позже.";
pub const DAY_CLOSED_MEANWHILE: &str = "⏳ День уже закрыт. Попробуйте позже.";
pub const WRONG_CODE: &str = "❌ Неверный код. Попробуйте ещё раз или нажмите «Отмена».";
pub const NO_ACCESS: &str = "⛔ У вас нет доступа к админ-панели.";
pub const INTERNAL_ERROR: &str = "⚠️ Произошла ошибка. Попробуйте позже.";
pub const ACTION_CANCELLED: &str = "Действие отменено.";
pub const REGISTRATION_CANCELLED: &str =
    "Регистрация отменена. Отправьте /start, чтобы начать заново.";
pub const REGISTRATION_START: &str = "👋 Добро пожаловать!\n\nДля регистрации введите вашу фамилию:";
pub const REGISTRATION_FAILED: &str =
    "❌ Не удалось завершить регистрацию. Возможно, вы уже зарегистрированы. Отправьте /start";
pub const BROADCAST_USE_BUTTONS: &str = "Подтвердите или отмените рассылку кнопками выше.";

pub fn welcome_back(user: &user::Model) -> String {
    format!(
        "👋 С возвращением, {}!\n\nГруппа: {}\n\nИспользуйте меню ниже.",
        user.full_name(),
        user.group_name
    )
}

pub fn registration_complete(user: &user::Model) -> String {
    format!(
        "✅ Регистрация завершена!\n\n👤 {}\n🎓 Группа: {}\n\nТеперь вы можете отмечаться на мероприятии.",
        user.full_name(),
        user.group_name
    )
}

/// Question asked when the conversation enters `step`.
pub fn registration_prompt(step: &RegistrationStep) -> &'static str {
    match step {
        RegistrationStep::LastName => "Введите вашу фамилию:",
        RegistrationStep::FirstName { .. } => "Введите ваше имя:",
        RegistrationStep::MiddleName { .. } => {
            "Введите ваше отчество или нажмите «Пропустить»:"
        }
        RegistrationStep::Group { .. } => "Введите вашу учебную группу:",
    }
}

/// Re-prompt after invalid input for `step`.
pub fn registration_retry(step: &RegistrationStep) -> &'static str {
    match step {
        RegistrationStep::LastName => "❌ Пожалуйста, введите корректную фамилию (минимум 2 символа):",
        RegistrationStep::FirstName { .. } => {
            "❌ Пожалуйста, введите корректное имя (минимум 2 символа):"
        }
        RegistrationStep::MiddleName { .. } => "❌ Пожалуйста, введите отчество:",
        RegistrationStep::Group { .. } => {
            "❌ Пожалуйста, введите корректную группу (минимум 2 символа):"
        }
    }
}

pub fn enter_code(day: i32) -> String {
    format!("📝 Введите код для Дня {day}:")
}

pub fn marked(day: i32, total_days: usize, day_count: i32) -> String {
    format!("✅ Вы отмечены на День {day}!\n\n📊 Всего посещено: {total_days} из {day_count}")
}

pub fn already_marked(day: i32) -> String {
    format!("✅ Вы уже отмечены на День {day}")
}

fn day_marks(day_count: i32, attended: impl Fn(i32) -> bool) -> String {
    (1..=day_count)
        .map(|day| if attended(day) { "✅" } else { "⬜" })
        .collect()
}

pub fn user_statistics(stats: &UserStatistics) -> String {
    let days = day_marks(stats.day_count, |day| stats.attended_days.contains(&day));
    let mut text = format!(
        "📊 Ваша статистика\n\n👤 {}\n🎓 Группа: {}\n\n{}\nПосещено дней: {} из {}",
        stats.user.full_name(),
        stats.user.group_name,
        days,
        stats.total(),
        stats.day_count
    );
    if !stats.attended_days.is_empty() {
        let list = stats
            .attended_days
            .iter()
            .map(i32::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        text.push_str(&format!("\nДни: {list}"));
    }
    text
}

pub fn admin_panel(active_day: Option<i32>, registered_users: usize) -> String {
    let status = match active_day {
        Some(day) => format!("🟢 Активен День {day}"),
        None => "🔴 Нет активного дня".to_string(),
    };
    format!("🔧 Админ-панель\n\n{status}\n👥 Зарегистрировано: {registered_users}")
}

/// Day list shown before picking a day to open.
pub fn days_overview(stats: &DayStatistics, day_count: i32) -> String {
    let mut text = String::from("🆕 Открытие дня\n\n");
    for day in 1..=day_count {
        let line = match stats.days.iter().find(|summary| summary.day_number == day) {
            Some(summary) if summary.is_active => {
                format!("🟢 День {day}: активен, отметилось {}", summary.attendees)
            }
            Some(summary) => format!("⚪ День {day}: отметилось {}", summary.attendees),
            None => format!("⬜ День {day}: не открывался"),
        };
        text.push_str(&line);
        text.push('\n');
    }
    text.push_str("\nВыберите день. Открытие закроет текущий активный день.");
    text
}

pub fn day_opened(day: i32, code: &str, previously_active: Option<i32>) -> String {
    let mut text = format!("✅ День {day} открыт!\n\n🔑 Код: {code}");
    if let Some(previous) = previously_active.filter(|previous| *previous != day) {
        text.push_str(&format!("\n\nДень {previous} закрыт автоматически."));
    }
    text.push_str("\n\nИспользуйте /admin для возврата в панель.");
    text
}

pub fn day_statistics(stats: &DayStatistics) -> String {
    let mut text = format!(
        "📊 Статистика\n\n👥 Зарегистрировано: {}\n",
        stats.registered_users
    );
    if stats.days.is_empty() {
        text.push_str("\nДни ещё не открывались.");
        return text;
    }
    for summary in &stats.days {
        let marker = if summary.is_active { "🟢" } else { "⚪" };
        text.push_str(&format!(
            "\n{marker} День {}: {} чел. (код: {})",
            summary.day_number, summary.attendees, summary.code
        ));
    }
    text
}

fn participant_line(index: usize, participant: &UserAttendance) -> String {
    format!(
        "{}. {} ({}) - {} дн.",
        index + 1,
        participant.full_name(),
        participant.group_name,
        participant.total_days
    )
}

pub fn participants(list: &[UserAttendance]) -> String {
    if list.is_empty() {
        return "👥 Участников пока нет.".to_string();
    }
    let mut text = format!("👥 Участники ({} всего)\n\n", list.len());
    for (index, participant) in list.iter().take(PARTICIPANTS_PREVIEW).enumerate() {
        text.push_str(&participant_line(index, participant));
        text.push('\n');
    }
    if list.len() > PARTICIPANTS_PREVIEW {
        text.push_str(&format!(
            "\n...и ещё {}. Полный список в отчёте.",
            list.len() - PARTICIPANTS_PREVIEW
        ));
    }
    text
}

pub fn full_report(report: &FullReport) -> String {
    let mut text = format!(
        "📋 Полный отчёт\n\n👥 Участников: {}\n",
        report.participants.len()
    );
    for summary in &report.days {
        text.push_str(&format!(
            "День {}: {} чел.\n",
            summary.day_number, summary.attendees
        ));
    }
    text.push('\n');
    for (index, participant) in report.participants.iter().enumerate() {
        let days = day_marks(report.day_count, |day| participant.attended(day));
        text.push_str(&format!(
            "{}. {} | {} | {} | {}/{}\n",
            index + 1,
            participant.full_name(),
            participant.group_name,
            days,
            participant.total_days,
            report.day_count
        ));
    }
    text
}

pub fn broadcast_prompt(recipients: usize) -> String {
    format!("📢 Рассылка\n\nПолучателей: {recipients}\n\nВведите текст сообщения:")
}

pub fn broadcast_preview(text: &str, recipients: usize) -> String {
    format!("📢 Предпросмотр рассылки ({recipients} получателей):\n\n{text}")
}

pub fn broadcast_progress(done: usize, total: usize) -> String {
    format!("📤 Рассылка... {done}/{total}")
}

pub fn broadcast_summary(sent: usize, failed: usize) -> String {
    format!("✅ Рассылка завершена\n\nДоставлено: {sent}\nОшибок: {failed}")
}

/// Splits `text` into pieces of at most `max_chars` characters, breaking on
/// line boundaries. A single longer line is hard-split.
pub fn split_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.lines() {
        let mut line = line.to_string();
        let mut line_len = line.chars().count();

        while line_len > max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let split_at = line
                .char_indices()
                .nth(max_chars)
                .map(|(index, _)| index)
                .unwrap_or(line.len());
            let rest = line.split_off(split_at);
            chunks.push(line);
            line = rest;
            line_len -= max_chars;
        }

        // +1 for the newline joining it to `current`.
        let needed = if current.is_empty() { line_len } else { line_len + 1 };
        if current_len + needed > max_chars {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if !current.is_empty() {
            current.push('\n');
            current_len += 1;
        }
        current.push_str(&line);
        current_len += line_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use engine::DaySummary;
    use std::collections::BTreeSet;

    fn user(id: i64, last: &str) -> user::Model {
        user::Model {
            user_id: id,
            last_name: last.to_string(),
            first_name: "Иван".to_string(),
            middle_name: None,
            group_name: "G-1".to_string(),
            registered_at: Utc::now(),
        }
    }

    #[test]
    fn test_split_chunks_respects_limit_and_lines() {
        let text = (1..=50)
            .map(|i| format!("строка номер {i}"))
            .collect::<Vec<_>>()
            .join("\n");
        let chunks = split_chunks(&text, 100);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 100);
        }
        assert_eq!(chunks.join("\n"), text);
    }

    #[test]
    fn test_split_chunks_hard_splits_long_line() {
        let line = "я".repeat(25);
        let chunks = split_chunks(&line, 10);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].chars().count(), 10);
        assert_eq!(chunks[2].chars().count(), 5);
        assert_eq!(chunks.concat(), line);
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        assert_eq!(split_chunks("a\nb", MAX_MESSAGE_CHARS), vec!["a\nb".to_string()]);
        assert!(split_chunks("", MAX_MESSAGE_CHARS).is_empty());
    }

    #[test]
    fn test_user_statistics_marks_days() {
        let stats = UserStatistics {
            user: user(1, "Иванов"),
            attended_days: vec![1, 3],
            day_count: 5,
        };
        let text = user_statistics(&stats);
        assert!(text.contains("✅⬜✅⬜⬜"));
        assert!(text.contains("2 из 5"));
        assert!(text.contains("Дни: 1, 3"));
    }

    #[test]
    fn test_participants_preview_is_capped() {
        let list: Vec<_> = (0..25)
            .map(|i| UserAttendance::new(user(i, &format!("Фамилия{i:02}")), BTreeSet::new()))
            .collect();
        let text = participants(&list);
        assert!(text.contains("20. "));
        assert!(!text.contains("21. "));
        assert!(text.contains("ещё 5"));
    }

    #[test]
    fn test_days_overview_states() {
        let stats = DayStatistics {
            days: vec![
                DaySummary {
                    day_number: 1,
                    code: "alpha".to_string(),
                    is_active: false,
                    attendees: 4,
                },
                DaySummary {
                    day_number: 2,
                    code: "beta".to_string(),
                    is_active: true,
                    attendees: 1,
                },
            ],
            registered_users: 5,
        };
        let text = days_overview(&stats, 3);
        assert!(text.contains("⚪ День 1: отметилось 4"));
        assert!(text.contains("🟢 День 2: активен, отметилось 1"));
        assert!(text.contains("⬜ День 3: не открывался"));
    }
}
