//! Campaign flow handlers.
//!
//! Each handler is a pure function from the current user document (plus any
//! event input) to a [`Turn`]: the messages to deliver and the updated
//! document. Randomness (vote score, gift roll) is passed in by the caller
//! so outcomes stay deterministic under test.

use crate::command::Carrier;
use crate::db::users::{Prompt, UserDocument};
use crate::event::Attachment;
use crate::message::{Button, MessageDescriptor, QuickReply};
use regex::Regex;
use serde_json::json;
use std::sync::OnceLock;

/// Outcome of one flow step.
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub messages: Vec<MessageDescriptor>,
    pub doc: UserDocument,
}

impl Turn {
    fn new(messages: Vec<MessageDescriptor>, doc: UserDocument) -> Self {
        Self { messages, doc }
    }
}

const GIFT_BOX_IMAGE: &str =
    "http://i1160.photobucket.com/albums/q491/tanhung0506/cuc%20kem_zpsaaktsdfy.png";
const OPEN_GIFT_PAYLOAD: &str = "OPEN_GIFT_1a5a3026-dedf-4e51";
const SHARE_URL: &str =
    "https://www.facebook.com/sharer.php?u=https://www.youtube.com/watch?v=wnSNyE2hVu4";
const REVIEW_VIDEO_URL: &str =
    "https://www.dropbox.com/s/lvj5wjjteg4ybtc/Toi-Thay-Hoa-Vang-Tren-Co-Xanh-Cover-Jang-Mi.mp4?dl=1";

fn vote_code_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9]{6}[ .-][0-9]$").unwrap())
}

fn phone_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(01[2689]|09|08)[0-9]{8}$").unwrap())
}

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\w+@[a-zA-Z_]+\.[a-zA-Z]{2,3}$").unwrap())
}

pub fn is_vote_code(input: &str) -> bool {
    vote_code_re().is_match(input)
}

fn menu_reply() -> QuickReply {
    QuickReply::new("Về menu chính", "BACK_TO_MENU")
}

fn name_suggestions(doc: &UserDocument) -> Vec<QuickReply> {
    let family_first = doc.full_name();
    let given_first = format!("{} {}", doc.first_name, doc.last_name);
    vec![
        QuickReply::new(&family_first, format!("USER_NAME {}", family_first)),
        QuickReply::new(&given_first, format!("USER_NAME {}", given_first)),
        QuickReply::new("Tên khác", "OTHER_NAME"),
    ]
}

/// Ask for a vote code and start waiting for one.
pub fn prompt_vote_code(mut doc: UserDocument) -> Turn {
    doc.last_prompt = Prompt::GetVoteId;
    let messages = vec![MessageDescriptor::quick_replies(
        format!(
            "{} ơi, Bạn có thể bình chọn cho bài dự thi yêu thích bằng cách gửi tin nhắn \
             có nội dung là \"Mã bài dự thi\" cho Mr. Colgate nhé.\n\
             Mã số dự thi có dạng: 123456-1 \nTrong đó 123456 là mã thí sinh; \
             1 là số thứ tự của bài dự thi. \nVd: 123456-1",
            doc.full_name()
        ),
        vec![
            QuickReply::new("XEM BẢNG XẾP HẠNG", "Bảng xếp hạng"),
            QuickReply::new("VỀ MENU CHÍNH", "BACK_TO_MENU"),
        ],
    )];
    Turn::new(messages, doc)
}

/// Record a vote for an entry code. With a complete profile the vote is
/// confirmed immediately and a gift draw is offered; otherwise the vote is
/// parked behind `flag_vote` and slot filling starts with the name.
pub fn register_vote(mut doc: UserDocument, vote_id: &str, score: u32, rank: u32) -> Turn {
    let mut messages = vec![MessageDescriptor::text(format!(
        "Bạn đang bình chọn cho mã bài dự thi \"{}\" \nĐể hoàn tất lượt bình chọn, \
         Hãy cung cấp thêm thông tin về bạn cho Mr. Colgate nha ;)",
        vote_id
    ))];
    doc.vote_id = vote_id.to_string();

    if doc.profile_complete() {
        doc.last_prompt = Prompt::None;
        doc.opened_gift = false;
        messages.push(vote_confirmed_text(&doc, score, rank));
        messages.push(gift_offer());
    } else {
        doc.flag_vote = true;
        // Typed replies count as the name too, not just the suggestions.
        doc.last_prompt = Prompt::GetUserName;
        messages.push(MessageDescriptor::quick_replies(
            "Họ và tên đầy đủ của bạn là gì nè?",
            name_suggestions(&doc),
        ));
    }
    Turn::new(messages, doc)
}

fn vote_confirmed_text(doc: &UserDocument, score: u32, rank: u32) -> MessageDescriptor {
    MessageDescriptor::text(format!(
        "Chúc mừng bạn {} đã bình chọn thành công cho mã bài dự thi {} \n\
         Mã bài dự thi {} đang có {} điểm và đang xếp hạng thứ {}",
        doc.full_name(),
        doc.vote_id,
        doc.vote_id,
        score,
        rank
    ))
}

fn gift_offer() -> MessageDescriptor {
    MessageDescriptor::quick_replies(
        "Mr. Colgate gửi tặng bạn 1 lượt nhận \"QUÀ MAY MẮN\" nè ^^",
        vec![
            QuickReply::new("Nhận quà", "SHOW_GIFT"),
            QuickReply::new("Bỏ qua", "BACK_TO_MENU"),
        ],
    )
}

/// The typed text did not match the vote-code format. The user stays in the
/// code-entry state and gets the format reminder again.
pub fn invalid_vote_code(doc: UserDocument, input: &str) -> Turn {
    let messages = vec![
        MessageDescriptor::text(format!(
            "Mã bài dự thi \"{}\" vừa nhập không đúng. {} hãy kiểm tra lại nhé.",
            input,
            doc.full_name()
        )),
        MessageDescriptor::quick_replies(
            "Mã số dự thi có dạng: 123456-1 \nTrong đó 123456 là mã thí sinh; \
             1 là số thứ tự của bài dự thi. \nVd: 123456-1",
            vec![
                QuickReply::new("Thử lại", "Bình chọn"),
                QuickReply::new("VỀ MENU CHÍNH", "BACK_TO_MENU"),
            ],
        ),
    ];
    Turn::new(messages, doc)
}

/// Accept a full name (typed or picked from a suggestion) and move on to the
/// phone number.
pub fn store_name(mut doc: UserDocument, name: &str) -> Turn {
    doc.user_name = name.to_string();
    doc.last_prompt = Prompt::GetPhoneNumber;
    Turn::new(
        vec![MessageDescriptor::text(
            "Bạn ơi cho Mr. Colgate thêm Số điện thoại nữa nha!^^",
        )],
        doc,
    )
}

/// The user wants to type a name instead of picking a suggestion.
pub fn ask_other_name(mut doc: UserDocument) -> Turn {
    doc.last_prompt = Prompt::GetUserName;
    Turn::new(
        vec![MessageDescriptor::text(
            "Họ và tên đầy đủ của bạn là gì nhỉ?",
        )],
        doc,
    )
}

/// Re-enter the phone-number state (retry quick reply).
pub fn ask_phone(mut doc: UserDocument) -> Turn {
    doc.last_prompt = Prompt::GetPhoneNumber;
    Turn::new(
        vec![MessageDescriptor::text(
            "Bạn ơi cho Mr. Colgate thêm Số điện thoại nữa nha!^^",
        )],
        doc,
    )
}

/// Re-enter the email state (retry quick reply).
pub fn ask_email(mut doc: UserDocument) -> Turn {
    doc.last_prompt = Prompt::GetEmail;
    Turn::new(
        vec![MessageDescriptor::text(
            "Thêm một thông tin cuối cùng nữa thôi nè, Email của bạn là gì?",
        )],
        doc,
    )
}

/// Validate and store a phone number. Invalid input keeps the user in the
/// phone state and offers a retry.
pub fn store_phone(mut doc: UserDocument, input: &str) -> Turn {
    if phone_re().is_match(input) {
        doc.phone = input.to_string();
        doc.last_prompt = Prompt::GetEmail;
        Turn::new(
            vec![MessageDescriptor::text(
                "Thêm một thông tin cuối cùng nữa thôi nè, Email của bạn là gì?",
            )],
            doc,
        )
    } else {
        Turn::new(
            vec![MessageDescriptor::quick_replies(
                "Số điện thoại không hợp lệ. Vui lòng nhập số điện thoại hợp lệ của bạn",
                vec![
                    QuickReply::new("Thử lại", "GET_PHONE_NUMBER"),
                    QuickReply::new("VỀ MENU CHÍNH", "BACK_TO_MENU"),
                ],
            )],
            doc,
        )
    }
}

/// Validate and store an email, then finish whichever flow was pending: a
/// parked vote gets confirmed with a gift offer, an uploaded entry moves to
/// the confirmation summary. Invalid input keeps the user in the email state.
pub fn store_email(mut doc: UserDocument, input: &str, score: u32, rank: u32) -> Turn {
    if !email_re().is_match(input) {
        return Turn::new(
            vec![MessageDescriptor::quick_replies(
                "Email không hợp lệ. Vui lòng nhập email hợp lệ của bạn",
                vec![
                    QuickReply::new("Thử lại", "GET_EMAIL"),
                    QuickReply::new("VỀ MENU CHÍNH", "BACK_TO_MENU"),
                ],
            )],
            doc,
        );
    }

    doc.email = input.to_string();
    doc.last_prompt = Prompt::None;

    if doc.flag_vote {
        doc.flag_vote = false;
        doc.opened_gift = false;
        let messages = vec![vote_confirmed_text(&doc, score, rank), gift_offer()];
        Turn::new(messages, doc)
    } else {
        before_confirm_upload(doc)
    }
}

/// A contest submission (audio or video) arrived. It is parked on the
/// document until confirmed; an incomplete profile detours through slot
/// filling first.
pub fn handle_upload(mut doc: UserDocument, attachment: Attachment) -> Turn {
    doc.pending_attachment = Some(attachment);
    doc.flag_vote = false;
    if doc.profile_complete() {
        before_confirm_upload(doc)
    } else {
        doc.last_prompt = Prompt::GetUserName;
        let messages = vec![
            MessageDescriptor::text("Bạn chờ tí nhé, Mr. Colgate đang xử lý dữ liệu^^"),
            MessageDescriptor::text(
                "Bạn cung cấp thêm cho Mr. Colgate một vài thông tin nữa nhen :)",
            ),
            MessageDescriptor::quick_replies(
                "Họ và tên đầy đủ của bạn là gì nhỉ?",
                name_suggestions(&doc),
            ),
        ];
        Turn::new(messages, doc)
    }
}

/// The uploaded file is neither audio nor video.
pub fn invalid_upload(doc: UserDocument) -> Turn {
    let messages = vec![MessageDescriptor::quick_replies(
        format!(
            "File bạn vừa gửi cho Mr. Colgate không đúng định dạng (audio/video). \
             Hãy thử lại lần nữa nha. \nNếu đây là sai sót, {} hãy thông báo cho Admin \
             biết về sai sót này qua email: hotro@thucthachmaxfresh.vn nha.",
            doc.full_name()
        ),
        vec![
            QuickReply::new("Cover ngay", "Cover ngay"),
            menu_reply(),
        ],
    )];
    Turn::new(messages, doc)
}

/// Show the submission summary (entry echo + collected profile) and ask for
/// confirmation.
pub fn before_confirm_upload(doc: UserDocument) -> Turn {
    let mut messages = vec![MessageDescriptor::text(format!(
        "{} ơi, Dưới đây là thông tin về bài dự thi của bạn. \
         Hãy kiểm tra lại và Xác nhận bài dự thi của mình nhé.",
        doc.full_name()
    ))];
    if let Some(attachment) = &doc.pending_attachment {
        messages.push(MessageDescriptor::Custom {
            raw: json!({
                "attachment": {
                    "type": attachment.kind,
                    "payload": { "url": attachment.url }
                }
            }),
        });
    }
    messages.push(MessageDescriptor::quick_replies(
        format!(
            "Họ tên: {}\nSố điện thoại: {}\nEmail: {}",
            doc.user_name, doc.phone, doc.email
        ),
        vec![
            QuickReply::new("Xác nhận", "CONFIRM_UPLOAD"),
            QuickReply::new("Sửa thông tin", "EDIT_INFO"),
            QuickReply::new("Huỷ bỏ", "CANCLE_UPLOAD"),
        ],
    ));
    Turn::new(messages, doc)
}

/// Accept the submission. The pending attachment is consumed and the user
/// gets a shareable confirmation card with their entry code.
pub fn confirm_upload(mut doc: UserDocument) -> Turn {
    doc.pending_attachment = None;
    let contestant_code: String = doc.sender.chars().take(6).collect();
    let messages = vec![MessageDescriptor::Custom {
        raw: json!({
            "attachment": {
                "type": "template",
                "payload": {
                    "template_type": "button",
                    "text": format!(
                        "Chúc mừng bạn đã nộp bài thành công.\nHọ và tên: {}\nMã thí sinh: {}\nMã bài dự thi: {}-1",
                        doc.user_name, contestant_code, contestant_code
                    ),
                    "buttons": [
                        {
                            "type": "web_url",
                            "url": SHARE_URL,
                            "title": "Share về Facebook"
                        },
                        {
                            "type": "postback",
                            "title": "Về menu chính",
                            "payload": "GET_STARTED_PAYLOAD"
                        }
                    ]
                }
            }
        }),
    }];
    Turn::new(messages, doc)
}

/// Drop the parked submission.
pub fn cancel_upload(mut doc: UserDocument) -> Turn {
    doc.pending_attachment = None;
    let messages = vec![MessageDescriptor::quick_replies(
        format!(
            ":( Mr. Colgate vừa nhận được yêu cầu huỷ bỏ bài dự thi từ bạn. \
             {} có muốn COVER tiếp không?",
            doc.full_name()
        ),
        vec![
            QuickReply::new("Cover ngay", "Cover ngay"),
            menu_reply(),
        ],
    )];
    Turn::new(messages, doc)
}

/// Offer the three gift boxes. All boxes carry the same postback token; the
/// draw happens on open, not on pick.
pub fn show_gift(doc: UserDocument) -> Turn {
    let gift_box = |title: &str| MessageDescriptor::Card {
        title: title.to_string(),
        image_url: GIFT_BOX_IMAGE.to_string(),
        subtitle: None,
        buttons: vec![
            Button::postback("Mở ngay", OPEN_GIFT_PAYLOAD),
            Button::postback("Về menu chính", "GET_STARTED_PAYLOAD"),
        ],
    };
    let messages = vec![
        MessageDescriptor::text("Mời bạn chọn 1 trong 3 hộp quà nha!"),
        gift_box("Hộp quà 1"),
        gift_box("Hộp quà 2"),
        gift_box("Hộp quà 3"),
    ];
    Turn::new(messages, doc)
}

/// Resolve the gift draw. One draw per vote: a document that already opened
/// its gift gets the consolation notice regardless of the roll. A roll of 6
/// or higher on a d10 wins a phone card.
pub fn open_gift(mut doc: UserDocument, roll: u8) -> Turn {
    if doc.opened_gift {
        let messages = vec![MessageDescriptor::quick_replies(
            "Bạn đã mở quà trước đó, vui lòng bầu chọn để nhận được cơ hội mở thêm quà",
            vec![menu_reply()],
        )];
        return Turn::new(messages, doc);
    }

    doc.opened_gift = true;
    let messages = if roll >= 6 {
        vec![MessageDescriptor::quick_replies(
            "Chúc mừng bạn đã trúng 1 \"THẺ CÀO ĐIỆN THOẠI TRỊ GIÁ 50.000 VNĐ\". \n\
             Hãy chọn nhà mạng phù hợp nào.",
            vec![
                QuickReply::new("Viettel", "CARD_VIETTEL"),
                QuickReply::new("Mobiphone", "CARD_MOBI"),
                QuickReply::new("Vinaphone", "CARD_VINA"),
            ],
        )]
    } else {
        vec![MessageDescriptor::quick_replies(
            "Buồn quá! Hộp quà của bạn không có giải thưởng rồi. Hãy \"BÌNH CHỌN\" cho \
             Bài dự thi khác và có cơ hội nhận thêm quà nhé.",
            vec![menu_reply()],
        )]
    };
    Turn::new(messages, doc)
}

/// Hand over the phone card code for the chosen carrier.
pub fn redeem_card(doc: UserDocument, _carrier: Carrier) -> Turn {
    let messages = vec![MessageDescriptor::quick_replies(
        "Mã thẻ cào: 01592 7057 1321 \nSeri: 107612965\nHạn sử dụng: 12/2019",
        vec![menu_reply()],
    )];
    Turn::new(messages, doc)
}

/// Replay a contest entry: the media itself plus a share/vote card.
pub fn review_entry(doc: UserDocument) -> Turn {
    let messages = vec![
        MessageDescriptor::Custom {
            raw: json!({
                "attachment": {
                    "type": "video",
                    "payload": { "url": REVIEW_VIDEO_URL }
                }
            }),
        },
        MessageDescriptor::Custom {
            raw: json!({
                "attachment": {
                    "type": "template",
                    "payload": {
                        "template_type": "button",
                        "text": "Mã bài dự thi 1322073801221392-1 \nThí sinh: Jang Mi  \n\
                                 Số lượng bình chọn: 816\n Xếp hạng: 2",
                        "buttons": [
                            {
                                "type": "web_url",
                                "url": SHARE_URL,
                                "title": "Share về Facebook"
                            },
                            {
                                "type": "postback",
                                "title": "Bình chọn",
                                "payload": "BC 1322073801221392"
                            }
                        ]
                    }
                }
            }),
        },
    ];
    Turn::new(messages, doc)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> UserDocument {
        UserDocument::new("1322073801221392", "Jane", "Doe")
    }

    fn complete_doc() -> UserDocument {
        let mut doc = doc();
        doc.user_name = "Doe Jane".into();
        doc.phone = "0912345678".into();
        doc.email = "jane@example.com".into();
        doc
    }

    #[test]
    fn test_vote_code_format() {
        assert!(is_vote_code("123456-1"));
        assert!(is_vote_code("123456 2"));
        assert!(is_vote_code("123456.9"));
        assert!(!is_vote_code("12345-1"));
        assert!(!is_vote_code("123456-12"));
        assert!(!is_vote_code("123456_1"));
        assert!(!is_vote_code("abcdef-1"));
    }

    #[test]
    fn test_prompt_vote_code_sets_state() {
        let turn = prompt_vote_code(doc());
        assert_eq!(turn.doc.last_prompt, Prompt::GetVoteId);
        assert_eq!(turn.messages.len(), 1);
    }

    #[test]
    fn test_register_vote_complete_profile() {
        let turn = register_vote(complete_doc(), "123456-1", 42, 3);
        assert_eq!(turn.doc.vote_id, "123456-1");
        assert!(!turn.doc.flag_vote);
        assert!(!turn.doc.opened_gift);
        assert_eq!(turn.doc.last_prompt, Prompt::None);
        // Intro, confirmation, gift offer.
        assert_eq!(turn.messages.len(), 3);
        match &turn.messages[1] {
            MessageDescriptor::Text { text } => {
                assert!(text.contains("123456-1"));
                assert!(text.contains("42"));
            }
            other => panic!("expected text, got {:?}", other),
        }
    }

    #[test]
    fn test_register_vote_incomplete_profile_parks_vote() {
        let turn = register_vote(doc(), "123456-1", 42, 3);
        assert!(turn.doc.flag_vote);
        assert_eq!(turn.doc.vote_id, "123456-1");
        assert_eq!(turn.doc.last_prompt, Prompt::GetUserName);
        match turn.messages.last().unwrap() {
            MessageDescriptor::QuickReplies { options, .. } => {
                assert_eq!(options.len(), 3);
                assert_eq!(options[0].payload, "USER_NAME Doe Jane");
                assert_eq!(options[1].payload, "USER_NAME Jane Doe");
                assert_eq!(options[2].payload, "OTHER_NAME");
            }
            other => panic!("expected quick replies, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_vote_code_stays_in_state() {
        let mut d = doc();
        d.last_prompt = Prompt::GetVoteId;
        let turn = invalid_vote_code(d, "nope");
        assert_eq!(turn.doc.last_prompt, Prompt::GetVoteId);
        assert_eq!(turn.messages.len(), 2);
    }

    #[test]
    fn test_name_then_phone_then_email() {
        let turn = store_name(doc(), "Doe Jane");
        assert_eq!(turn.doc.user_name, "Doe Jane");
        assert_eq!(turn.doc.last_prompt, Prompt::GetPhoneNumber);

        let turn = store_phone(turn.doc, "0912345678");
        assert_eq!(turn.doc.phone, "0912345678");
        assert_eq!(turn.doc.last_prompt, Prompt::GetEmail);
    }

    #[test]
    fn test_invalid_phone_stays_in_state() {
        let mut d = doc();
        d.last_prompt = Prompt::GetPhoneNumber;
        let turn = store_phone(d, "12345");
        assert!(turn.doc.phone.is_empty());
        assert_eq!(turn.doc.last_prompt, Prompt::GetPhoneNumber);
    }

    #[test]
    fn test_phone_formats() {
        for valid in ["0912345678", "0812345678", "01234567890", "01612345678"] {
            assert_eq!(store_phone(doc(), valid).doc.phone, valid);
        }
        for invalid in ["091234567", "09123456789", "0161234567", "0712345678", "phone"] {
            assert!(store_phone(doc(), invalid).doc.phone.is_empty());
        }
    }

    #[test]
    fn test_invalid_email_stays_in_state() {
        let mut d = doc();
        d.last_prompt = Prompt::GetEmail;
        let turn = store_email(d, "not-an-email", 1, 1);
        assert!(turn.doc.email.is_empty());
        assert_eq!(turn.doc.last_prompt, Prompt::GetEmail);
    }

    #[test]
    fn test_email_completes_parked_vote() {
        let mut d = doc();
        d.user_name = "Doe Jane".into();
        d.phone = "0912345678".into();
        d.flag_vote = true;
        d.vote_id = "123456-1".into();
        d.last_prompt = Prompt::GetEmail;

        let turn = store_email(d, "jane@example.com", 77, 2);
        assert_eq!(turn.doc.email, "jane@example.com");
        assert!(!turn.doc.flag_vote);
        assert!(!turn.doc.opened_gift);
        assert_eq!(turn.doc.last_prompt, Prompt::None);
        assert_eq!(turn.messages.len(), 2);
    }

    #[test]
    fn test_email_completes_upload() {
        let mut d = doc();
        d.user_name = "Doe Jane".into();
        d.phone = "0912345678".into();
        d.pending_attachment = Some(Attachment {
            kind: "audio".into(),
            url: "http://cdn/entry.mp3".into(),
        });
        d.last_prompt = Prompt::GetEmail;

        let turn = store_email(d, "jane@example.com", 1, 1);
        assert_eq!(turn.doc.email, "jane@example.com");
        // Summary, attachment echo, confirmation quick replies.
        assert_eq!(turn.messages.len(), 3);
        assert!(turn.doc.pending_attachment.is_some());
    }

    #[test]
    fn test_upload_with_complete_profile_goes_to_confirm() {
        let attachment = Attachment {
            kind: "video".into(),
            url: "http://cdn/entry.mp4".into(),
        };
        let turn = handle_upload(complete_doc(), attachment.clone());
        assert_eq!(turn.doc.pending_attachment, Some(attachment));
        assert!(!turn.doc.flag_vote);
        assert_eq!(turn.messages.len(), 3);
        match &turn.messages[2] {
            MessageDescriptor::QuickReplies { options, .. } => {
                assert_eq!(options[0].payload, "CONFIRM_UPLOAD");
                assert_eq!(options[2].payload, "CANCLE_UPLOAD");
            }
            other => panic!("expected quick replies, got {:?}", other),
        }
    }

    #[test]
    fn test_upload_clears_parked_vote() {
        let mut d = doc();
        d.flag_vote = true;
        let turn = handle_upload(
            d,
            Attachment {
                kind: "audio".into(),
                url: "http://cdn/entry.mp3".into(),
            },
        );
        assert!(!turn.doc.flag_vote);
        // Incomplete profile: detour through name collection.
        assert_eq!(turn.doc.last_prompt, Prompt::GetUserName);
        match turn.messages.last().unwrap() {
            MessageDescriptor::QuickReplies { options, .. } => {
                assert_eq!(options[2].payload, "OTHER_NAME");
            }
            other => panic!("expected quick replies, got {:?}", other),
        }
    }

    #[test]
    fn test_confirm_upload_consumes_attachment() {
        let mut d = complete_doc();
        d.pending_attachment = Some(Attachment {
            kind: "audio".into(),
            url: "http://cdn/entry.mp3".into(),
        });
        let turn = confirm_upload(d);
        assert!(turn.doc.pending_attachment.is_none());
        match &turn.messages[0] {
            MessageDescriptor::Custom { raw } => {
                let text = raw["attachment"]["payload"]["text"].as_str().unwrap();
                assert!(text.contains("132207-1"));
                assert!(text.contains("Doe Jane"));
            }
            other => panic!("expected custom, got {:?}", other),
        }
    }

    #[test]
    fn test_cancel_upload_drops_attachment() {
        let mut d = doc();
        d.pending_attachment = Some(Attachment {
            kind: "audio".into(),
            url: "http://cdn/entry.mp3".into(),
        });
        let turn = cancel_upload(d);
        assert!(turn.doc.pending_attachment.is_none());
    }

    #[test]
    fn test_show_gift_is_text_plus_three_cards() {
        let turn = show_gift(doc());
        assert_eq!(turn.messages.len(), 4);
        assert!(matches!(turn.messages[0], MessageDescriptor::Text { .. }));
        for card in &turn.messages[1..] {
            match card {
                MessageDescriptor::Card { buttons, .. } => {
                    assert_eq!(buttons[0].target.as_deref(), Some(OPEN_GIFT_PAYLOAD));
                }
                other => panic!("expected card, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_open_gift_win_and_lose() {
        let win = open_gift(doc(), 6);
        assert!(win.doc.opened_gift);
        match &win.messages[0] {
            MessageDescriptor::QuickReplies { options, .. } => {
                assert_eq!(options[0].payload, "CARD_VIETTEL");
            }
            other => panic!("expected quick replies, got {:?}", other),
        }

        let lose = open_gift(doc(), 5);
        assert!(lose.doc.opened_gift);
        match &lose.messages[0] {
            MessageDescriptor::QuickReplies { options, .. } => {
                assert_eq!(options.len(), 1);
            }
            other => panic!("expected quick replies, got {:?}", other),
        }
    }

    #[test]
    fn test_open_gift_only_once() {
        let mut d = doc();
        d.opened_gift = true;
        let turn = open_gift(d, 10);
        assert!(turn.doc.opened_gift);
        match &turn.messages[0] {
            MessageDescriptor::QuickReplies { title, .. } => {
                assert!(title.as_deref().unwrap().contains("đã mở quà"));
            }
            other => panic!("expected quick replies, got {:?}", other),
        }
    }

    #[test]
    fn test_review_entry_shape() {
        let turn = review_entry(doc());
        assert_eq!(turn.messages.len(), 2);
        assert!(matches!(turn.messages[0], MessageDescriptor::Custom { .. }));
    }
}
