//! Localized message tables.
//!
//! Every message the bot can send lives here as a struct field, so adding a
//! message or a locale forces the other side to be filled in at compile time.

/// Languages the bot speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    #[default]
    English,
    Khmer,
}

impl Language {
    /// Decode a stored language value. Unknown strings fall back to English.
    pub fn from_str(s: &str) -> Self {
        match s {
            "khmer" => Language::Khmer,
            _ => Language::English,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Language::English => "english",
            Language::Khmer => "khmer",
        }
    }

    /// Message table for this language.
    pub fn texts(self) -> &'static Texts {
        match self {
            Language::English => &ENGLISH,
            Language::Khmer => &KHMER,
        }
    }

    /// Recognize a language choice from a keyboard button press or typed
    /// name. Substring matching so decorated button labels still count.
    pub fn from_choice(text: &str) -> Option<Self> {
        if text.contains("English") {
            Some(Language::English)
        } else if text.contains("ខ្មែរ") || text.contains("Khmer") {
            Some(Language::Khmer)
        } else {
            None
        }
    }
}

/// Reply-keyboard button labels. Not localized: each label carries its own
/// flag or bilingual phrasing, matching what users expect to tap.
pub const BUTTON_KHMER: &str = "🇰🇭 ខ្មែរ (Khmer)";
pub const BUTTON_ENGLISH: &str = "🇺🇸 English";
pub const BUTTON_CLEAR_YES: &str = "Yes, clear my data";
pub const BUTTON_CLEAR_NO: &str = "No, keep my data";

/// A reply to the clear-data confirmation prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearReply {
    Yes,
    No,
    Other,
}

impl ClearReply {
    /// Loose matching: a reply containing "yes" confirms, otherwise one
    /// containing "no" cancels. Covers the keyboard buttons and bare words.
    pub fn parse(text: &str) -> Self {
        let lower = text.to_lowercase();
        if lower.contains("yes") {
            ClearReply::Yes
        } else if lower.contains("no") {
            ClearReply::No
        } else {
            ClearReply::Other
        }
    }
}

/// One field per message the bot sends.
pub struct Texts {
    pub welcome: &'static str,
    pub start: &'static str,
    pub choose_language: &'static str,
    pub select_language: &'static str,
    pub room_number: &'static str,
    pub invalid_room: &'static str,
    pub electricity: &'static str,
    pub water: &'static str,
    pub invalid_number: &'static str,
    pub data_saved: &'static str,
    pub no_receipt_yet: &'static str,
    pub thank_you: &'static str,
    pub reminder: &'static str,
    pub receipt_ready: &'static str,
    pub clear_confirm: &'static str,
    pub data_cleared: &'static str,
    pub cancelled: &'static str,
    pub error: &'static str,
}

pub static ENGLISH: Texts = Texts {
    welcome: "Welcome! Please send /start to begin.",
    start: "Hello! Welcome to Utility Tracker Bot. I will remind you monthly to submit your utility usage.",
    choose_language: "Please choose your preferred language:",
    select_language: "Please select a language from the options below.",
    room_number: "Please enter your room number. Example: A101",
    invalid_room: "Please enter a valid room number.",
    electricity: "Please enter this month's electricity usage (numbers only). Example: 150",
    water: "Please enter this month's water usage (numbers only). Example: 25",
    invalid_number: "Please enter a valid number.",
    data_saved: "Your utility data has been saved.",
    no_receipt_yet: "No receipt image found for your room number yet. Please wait a moment, and I will send it once it's available.",
    thank_you: "Thank you for submitting your utility usage!",
    reminder: "🔔 Reminder: Rent is due! Please submit your utility usage for this month.",
    receipt_ready: "Here is your receipt for this month:",
    clear_confirm: "Are you sure you want to clear all your data and stop using the bot? This will remove your language preference, room number, and stop reminders. You can always /start again.",
    data_cleared: "All your session data has been cleared. You will no longer receive reminders. You can type /start anytime to begin again.",
    cancelled: "Operation cancelled. Your data has not been cleared.",
    error: "An error occurred. Please try again.",
};

pub static KHMER: Texts = Texts {
    welcome: "សូមស្វាគមន៍! សូមផ្ញើ /start ដើម្បីចាប់ផ្តើម។",
    start: "សួស្តី! សូមស្វាគមន៍មកកាន់ប្រព័ន្ធតាមដានការប្រើប្រាស់ឧបករណ៍។ ខ្ញុំនឹងរំលឹកអ្នករាល់ខែដើម្បីបញ្ជូនការប្រើប្រាស់របស់អ្នក។",
    choose_language: "សូមជ្រើសរើសភាសាដែលអ្នកចូលចិត្ត:",
    select_language: "សូមជ្រើសរើសភាសាមួយពីជម្រើសខាងក្រោម។",
    room_number: "សូមបញ្ចូលលេខបន្ទប់របស់អ្នក។ ឧទាហរណ៍: A101",
    invalid_room: "សូមបញ្ចូលលេខបន្ទប់ដែលត្រឹមត្រូវ។",
    electricity: "សូមបញ្ចូលការប្រើប្រាស់ភ្លើងរបស់ខែនេះ (តួលេខតែប៉ុណ្ណោះ)។ ឧទុហរណ៍: 150",
    water: "សូមបញ្ចូលការប្រើប្រាស់ទឹករបស់ខែនេះ (តួលេខតែប៉ុណ្ណោះ)។ ឧទុហរណ៍: 25",
    invalid_number: "សូមបញ្ចូលលេខដែលត្រឹមត្រូវ។",
    data_saved: "ទិន្នន័យប្រើប្រាស់របស់អ្នកត្រូវបានរក្សាទុក។",
    no_receipt_yet: "រកមិនទាន់ឃើញបង្កាន់ដៃសម្រាប់លេខបន្ទប់របស់អ្នកទេ។ សូមរង់ចាំបន្តិច ខ្ញុំនឹងផ្ញើវាពេលវាមាន។",
    thank_you: "សូមអរគុណសម្រាប់ការដាក់បញ្ចូលការប្រើប្រាស់ឧបករណ៍របស់អ្នក!",
    reminder: "🔔 ការរំលឹក: ថ្ងៃបង់ថ្លៃជួលបន្ទប់ដល់ហើយ! សូមបញ្ជូនការប្រើប្រាស់ឧបករណ៍របស់អ្នកសម្រាប់ខែនេះ។",
    receipt_ready: "នេះជាបង្កាន់ដៃសម្រាប់ខែនេៈ:",
    clear_confirm: "តើអ្នកប្រាកដជាចង់លុបទិន្នន័យរបស់អ្នកទាំងអស់ ហើយឈប់ប្រើបូតនេះមែនទេ? វានឹងលុបចំណូលចិត្តភាសារបស់អ្នក លេខបន្ទប់ និងបញ្ឈប់ការរំលឹក។ អ្នកអាច /start ឡើងវិញបានគ្រប់ពេល។",
    data_cleared: "ទិន្នន័យវគ្គរបស់អ្នកទាំងអស់ត្រូវបានលុប។ អ្នកនឹងលែងទទួលបានការរំលឹកទៀតហើយ។ អ្នកអាចវាយ /start គ្រប់ពេលដើម្បីចាប់ផ្តើមម្តងទៀត។",
    cancelled: "ប្រតិបត្តិការត្រូវបានលុបចោល។ ទិន្នន័យរបស់អ្នកមិនត្រូវបានលុបទេ។",
    error: "មានកំហុសកើតឡើង។ សូមព្យាយាមម្តងទៀត។",
};
