/// Text of the vote trigger. Appears as a postback payload, a quick-reply
/// payload, and as literal typed text.
pub const VOTE_TRIGGER: &str = "Bình chọn";

/// Phone card carriers offered when a gift draw wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Carrier {
    Viettel,
    Mobifone,
    Vinaphone,
}

/// The control-token protocol carried in quick-reply and postback payloads,
/// parsed once at the boundary and matched exhaustively in the engine.
///
/// Unrecognized payloads parse to `None` and fall through to the NLU; that
/// lenient default mirrors the platform content we do not interpret (menu
/// postbacks, NLU-trained phrases).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start the voting flow.
    Vote,
    /// "BC <voteId>" — vote for an entry without the code prompt.
    QuickVote(String),
    /// "NGHE_THU" — replay a contest entry.
    Review,
    /// "OPEN_GIFT_<token>" — open one of the offered gift boxes.
    OpenGift,
    ShowGift,
    ConfirmUpload,
    /// Wire constant is "CANCLE_UPLOAD" (sic).
    CancelUpload,
    /// "USER_NAME <full name>" — name picked from a quick-reply suggestion.
    UserName(String),
    OtherName,
    EditInfo,
    RedeemCard(Carrier),
    AskPhone,
    AskEmail,
    BackToMenu,
}

impl Command {
    pub fn parse(payload: &str) -> Option<Command> {
        if payload == VOTE_TRIGGER {
            return Some(Command::Vote);
        }
        if let Some(vote_id) = payload.strip_prefix("BC ") {
            return Some(Command::QuickVote(vote_id.to_string()));
        }
        if payload == "NGHE_THU" {
            return Some(Command::Review);
        }
        if payload.starts_with("OPEN_GIFT_") {
            return Some(Command::OpenGift);
        }
        if payload.starts_with("SHOW_GIFT") {
            return Some(Command::ShowGift);
        }
        if payload.starts_with("CONFIRM_UPLOAD") {
            return Some(Command::ConfirmUpload);
        }
        if payload.starts_with("CANCLE_UPLOAD") {
            return Some(Command::CancelUpload);
        }
        if let Some(name) = payload.strip_prefix("USER_NAME ") {
            return Some(Command::UserName(name.to_string()));
        }
        if payload.starts_with("OTHER_NAME") {
            return Some(Command::OtherName);
        }
        if payload.starts_with("EDIT_INFO") {
            return Some(Command::EditInfo);
        }
        if payload.starts_with("CARD_VIETTEL") {
            return Some(Command::RedeemCard(Carrier::Viettel));
        }
        if payload.starts_with("CARD_MOBI") {
            return Some(Command::RedeemCard(Carrier::Mobifone));
        }
        if payload.starts_with("CARD_VINA") {
            return Some(Command::RedeemCard(Carrier::Vinaphone));
        }
        if payload.starts_with("GET_PHONE_NUMBER") {
            return Some(Command::AskPhone);
        }
        if payload.starts_with("GET_EMAIL") {
            return Some(Command::AskEmail);
        }
        if payload == "BACK_TO_MENU" {
            return Some(Command::BackToMenu);
        }
        None
    }
}
