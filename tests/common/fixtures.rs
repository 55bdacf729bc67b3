//! Attachment feed fixtures

use attachment_tree::types::{
    AttachmentRecord, AttachmentResponse, AttachmentSources, DetailSource, GroupSource,
};

/// Main form feed as the platform sends it (percent-encoded names, mixed id types)
pub const MAIN_FORM_FEED: &str = r#"{
    "code": 200,
    "data": {
        "attachmentRecordList": [
            {
                "asrFid": "main-1",
                "asrName": "contract%20v2.pdf",
                "asrSize": 20480,
                "typeName": "Contract",
                "asrRemark": "signed by both parties",
                "asrSessionGuid": "sess-1",
                "bustypecode": "PO"
            },
            {
                "asrFid": 1002,
                "asrName": "invoice.pdf",
                "asrSize": "512",
                "typeName": "Invoice",
                "asrRemark": "march"
            },
            {
                "asrFid": "main-3",
                "asrName": "invoice.pdf",
                "typeName": "Invoice"
            }
        ]
    }
}"#;

/// Build one attachment record
pub fn record(fid: &str, name: &str, type_name: &str) -> AttachmentRecord {
    AttachmentRecord {
        asr_fid: fid.to_string(),
        asr_name: name.to_string(),
        type_name: Some(type_name.to_string()),
        ..Default::default()
    }
}

/// Main form plus a two-row detail table; the second row's feed failed
pub fn form_with_detail_table() -> AttachmentSources {
    let main: AttachmentResponse =
        serde_json::from_str(MAIN_FORM_FEED).expect("fixture feed must parse");
    AttachmentSources {
        main: Some(main),
        groups: vec![GroupSource {
            name: "Approval".to_string(),
            response: AttachmentResponse::ok(vec![record("grp-1", "memo.docx", "Memo")]),
        }],
        details: vec![DetailSource {
            name: "DetailTable".to_string(),
            rows: vec![
                AttachmentResponse::ok(vec![
                    record("row1-a", "front.jpg", "Photo"),
                    record("row1-b", "back.jpg", "Photo"),
                ]),
                AttachmentResponse::failed(500),
                AttachmentResponse::ok(vec![record("row3-a", "receipt.png", "Receipt")]),
            ],
        }],
    }
}

/// Every file id in [`form_with_detail_table`]
pub fn all_file_ids() -> Vec<&'static str> {
    vec![
        "main-1", "1002", "main-3", "grp-1", "row1-a", "row1-b", "row3-a",
    ]
}
