use super::telegram::{
    InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, ReplyKeyboardMarkup,
    ReplyKeyboardRemove, ReplyMarkup, WebAppInfo,
};

pub const ENTER_CODE_BUTTON: &str = "📝 Ввести код дня";
pub const MY_STATS_BUTTON: &str = "📊 Моя статистика";
pub const CANCEL_BUTTON: &str = "❌ Отмена";
pub const SKIP_BUTTON: &str = "⏭ Пропустить";
pub const WEBAPP_BUTTON: &str = "📱 Отметиться в приложении";

/// Inline admin panel actions, encoded as callback data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAction {
    Back,
    NewDay,
    SelectDay(i32),
    CloseDay,
    Stats,
    Users,
    FullReport,
    Broadcast,
    ConfirmBroadcast,
    CancelBroadcast,
}

impl AdminAction {
    pub fn parse(data: &str) -> Option<Self> {
        let action = match data {
            "admin_back" => AdminAction::Back,
            "admin_new_day" => AdminAction::NewDay,
            "admin_close_day" => AdminAction::CloseDay,
            "admin_stats" => AdminAction::Stats,
            "admin_users" => AdminAction::Users,
            "admin_full_report" => AdminAction::FullReport,
            "admin_broadcast" => AdminAction::Broadcast,
            "confirm_broadcast" => AdminAction::ConfirmBroadcast,
            "cancel_broadcast" => AdminAction::CancelBroadcast,
            other => AdminAction::SelectDay(other.strip_prefix("select_day_")?.parse().ok()?),
        };
        Some(action)
    }

    pub fn callback_data(self) -> String {
        match self {
            AdminAction::Back => "admin_back".to_string(),
            AdminAction::NewDay => "admin_new_day".to_string(),
            AdminAction::SelectDay(day) => format!("select_day_{day}"),
            AdminAction::CloseDay => "admin_close_day".to_string(),
            AdminAction::Stats => "admin_stats".to_string(),
            AdminAction::Users => "admin_users".to_string(),
            AdminAction::FullReport => "admin_full_report".to_string(),
            AdminAction::Broadcast => "admin_broadcast".to_string(),
            AdminAction::ConfirmBroadcast => "confirm_broadcast".to_string(),
            AdminAction::CancelBroadcast => "cancel_broadcast".to_string(),
        }
    }
}

fn button(text: &str) -> KeyboardButton {
    KeyboardButton {
        text: text.to_string(),
        web_app: None,
    }
}

fn inline(text: &str, action: AdminAction) -> InlineKeyboardButton {
    InlineKeyboardButton {
        text: text.to_string(),
        callback_data: action.callback_data(),
    }
}

fn reply_keyboard(rows: Vec<Vec<KeyboardButton>>) -> ReplyMarkup {
    ReplyMarkup::Keyboard(ReplyKeyboardMarkup {
        keyboard: rows,
        resize_keyboard: true,
    })
}

/// Main menu for registered participants.
pub fn main_menu(webapp_url: Option<&str>) -> ReplyMarkup {
    let mut rows = Vec::new();
    if let Some(url) = webapp_url {
        rows.push(vec![KeyboardButton {
            text: WEBAPP_BUTTON.to_string(),
            web_app: Some(WebAppInfo {
                url: url.to_string(),
            }),
        }]);
    }
    rows.push(vec![button(ENTER_CODE_BUTTON)]);
    rows.push(vec![button(MY_STATS_BUTTON)]);
    reply_keyboard(rows)
}

pub fn cancel_keyboard() -> ReplyMarkup {
    reply_keyboard(vec![vec![button(CANCEL_BUTTON)]])
}

pub fn skip_keyboard() -> ReplyMarkup {
    reply_keyboard(vec![vec![button(SKIP_BUTTON)], vec![button(CANCEL_BUTTON)]])
}

pub fn remove_keyboard() -> ReplyMarkup {
    ReplyMarkup::Remove(ReplyKeyboardRemove {
        remove_keyboard: true,
    })
}

pub fn admin_menu() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup {
        inline_keyboard: vec![
            vec![inline("🆕 Открыть день", AdminAction::NewDay)],
            vec![inline("🔒 Закрыть день", AdminAction::CloseDay)],
            vec![inline("📊 Статистика", AdminAction::Stats)],
            vec![inline("👥 Участники", AdminAction::Users)],
            vec![inline("📋 Полный отчёт", AdminAction::FullReport)],
            vec![inline("📢 Рассылка", AdminAction::Broadcast)],
        ],
    }
}

/// One button per event day, three per row.
pub fn day_selection(day_count: i32) -> InlineKeyboardMarkup {
    let days: Vec<_> = (1..=day_count)
        .map(|day| inline(&format!("День {day}"), AdminAction::SelectDay(day)))
        .collect();
    let mut rows: Vec<Vec<_>> = days.chunks(3).map(<[_]>::to_vec).collect();
    rows.push(vec![inline("◀️ Назад", AdminAction::Back)]);
    InlineKeyboardMarkup {
        inline_keyboard: rows,
    }
}

pub fn back_to_admin() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup {
        inline_keyboard: vec![vec![inline("◀️ Назад", AdminAction::Back)]],
    }
}

pub fn cancel_broadcast() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup {
        inline_keyboard: vec![vec![inline("❌ Отмена", AdminAction::CancelBroadcast)]],
    }
}

pub fn confirm_broadcast() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup {
        inline_keyboard: vec![vec![
            inline("✅ Отправить", AdminAction::ConfirmBroadcast),
            inline("❌ Отмена", AdminAction::CancelBroadcast),
        ]],
    }
}
