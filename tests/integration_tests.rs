//! Integration tests for chat-etl.
//!
//! These tests run the full parse, transform and export pipeline over
//! synthetic exports written by the generators.

use std::path::Path;

use chat_etl::archive::{DirSource, ZipArchiveIo, ZipSource};
use chat_etl::directory::{reconcile_users, DirectoryUser, JsonUserDirectory};
use chat_etl::export::BulkExporter;
use chat_etl::model::Intermediate;
use chat_etl::parser::{ParseOptions, SlackParser, TelegramParser};
use chat_etl::partition::{TeamMap, TeamPartitioner};
use chat_etl::transform::{EmojiTable, TransformOptions, Transformer};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

mod generators;

use generators::*;

fn slack_model(root: &Path, options: TransformOptions) -> Intermediate {
    let mut source = DirSource::open(root).unwrap();
    let export = SlackParser::new(ParseOptions::new("acme")).parse(&mut source).unwrap();
    let emoji = EmojiTable::builtin();
    Transformer::new(&emoji, options, root)
        .unwrap()
        .transform_slack(&export)
        .unwrap()
}

fn export_lines(model: &Intermediate) -> Vec<Value> {
    BulkExporter::new()
        .export_to_string(model)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

fn line_types(lines: &[Value]) -> Vec<String> {
    lines
        .iter()
        .map(|line| line["type"].as_str().unwrap().to_string())
        .collect()
}

fn workspace() -> SlackExportBuilder {
    SlackExportBuilder::new()
        .user("U1", "alice", "Alice@Example.com")
        .user("U2", "bob", "bob@example.com")
        .channel("C1", "general", &["U1", "U2"])
        .group("G1", "secret", &["U2"])
        .dm("D1", &["U1", "U2"])
}

mod slack {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_full_pipeline_line_order() {
        let dir = tempfile::tempdir().unwrap();
        workspace()
            .messages(
                "general",
                "2024-01-01",
                json!([
                    slack_message("U1", "hi <@U2>, see <#C1>", "1704067200.000100"),
                    {"user": "U2", "text": "thanks", "ts": "1704067260.000000", "thread_ts": "1704067200.000100"}
                ]),
            )
            .messages("D1", "2024-01-01", json!([slack_message("U2", "psst", "1704067300.000000")]))
            .write_to(dir.path());

        let model = slack_model(dir.path(), TransformOptions::default());
        let lines = export_lines(&model);

        assert_eq!(
            line_types(&lines),
            vec!["version", "channel", "channel", "user", "user", "direct_channel", "post", "direct_post"]
        );
        assert_eq!(lines[3]["user"]["email"], "alice@example.com");
        assert_eq!(lines[6]["post"]["message"], "hi @bob, see ~general");
        assert_eq!(lines[6]["post"]["replies"][0]["message"], "thanks");
        assert_eq!(lines[7]["direct_post"]["channel_members"], json!(["alice", "bob"]));
    }

    #[test]
    fn test_users_carry_channel_memberships() {
        let dir = tempfile::tempdir().unwrap();
        workspace().write_to(dir.path());

        let lines = export_lines(&slack_model(dir.path(), TransformOptions::default()));
        let bob = lines
            .iter()
            .find(|l| l["type"] == "user" && l["user"]["username"] == "bob")
            .unwrap();
        assert_eq!(
            bob["user"]["teams"],
            json!([{
                "name": "acme",
                "roles": "team_user",
                "channels": [
                    {"name": "general", "roles": "channel_user"},
                    {"name": "secret", "roles": "channel_user"}
                ]
            }])
        );
    }

    #[test]
    fn test_attachment_overflow_becomes_synthetic_replies() {
        let dir = tempfile::tempdir().unwrap();
        let mut builder = workspace().messages(
            "general",
            "2024-01-01",
            json!([message_with_files("U1", "1704067200.000000", 12)]),
        );
        for i in 0..12 {
            builder = builder.upload(&format!("F{i}"), &format!("file{i}.txt"), b"data");
        }
        builder.write_to(dir.path());

        let model = slack_model(dir.path(), TransformOptions::default());
        let post = &model.posts[0];

        assert_eq!(post.attachments.len(), 5);
        assert_eq!(post.replies.len(), 2);
        assert_eq!(post.replies[0].attachments.len(), 5);
        assert_eq!(post.replies[1].attachments.len(), 2);
        assert!(post.replies.iter().all(|r| r.user == "alice" && r.message.is_empty()));
        assert_eq!(post.replies[0].create_at, post.create_at + 1);
        assert_eq!(post.replies[1].create_at, post.create_at + 2);
    }

    #[test]
    fn test_attachments_copied_to_attachments_dir() {
        let dir = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let mut builder = workspace().messages(
            "general",
            "2024-01-01",
            json!([message_with_files("U1", "1704067200.000000", 1)]),
        );
        builder = builder.upload("F0", "file0.txt", b"data");
        builder.write_to(dir.path());

        let options = TransformOptions::default().with_attachments_dir(out.path());
        let model = slack_model(dir.path(), options);

        let path = &model.posts[0].attachments[0];
        assert_eq!(path, "bulk-export-attachments/F0_file0.txt");
        assert_eq!(std::fs::read(out.path().join(path)).unwrap(), b"data");
    }

    #[test]
    fn test_skip_attachments_drops_files() {
        let dir = tempfile::tempdir().unwrap();
        workspace()
            .messages("general", "2024-01-01", json!([message_with_files("U1", "1.000", 3)]))
            .upload("F0", "file0.txt", b"data")
            .write_to(dir.path());

        let model = slack_model(dir.path(), TransformOptions::default().with_skip_attachments(true));
        assert!(model.posts[0].attachments.is_empty());
        assert!(model.posts[0].replies.is_empty());
    }

    #[test]
    fn test_colliding_timestamps_are_spread() {
        let dir = tempfile::tempdir().unwrap();
        workspace()
            .messages(
                "general",
                "2024-01-01",
                json!([
                    slack_message("U1", "one", "1704067200.000100"),
                    slack_message("U2", "two", "1704067200.000900"),
                    slack_message("U1", "three", "1704067200.000000")
                ]),
            )
            .write_to(dir.path());

        let model = slack_model(dir.path(), TransformOptions::default());
        let times: Vec<i64> = model.posts.iter().map(|p| p.create_at).collect();
        assert_eq!(times, vec![1_704_067_200_000, 1_704_067_200_001, 1_704_067_200_002]);
    }

    #[test]
    fn test_output_is_byte_identical_across_runs() {
        let dir = tempfile::tempdir().unwrap();
        workspace()
            .messages("general", "2024-01-01", json!([slack_message("U1", "*hi* ~all~", "1.000")]))
            .write_to(dir.path());

        let first = BulkExporter::new()
            .export_to_string(&slack_model(dir.path(), TransformOptions::default()))
            .unwrap();
        let second = BulkExporter::new()
            .export_to_string(&slack_model(dir.path(), TransformOptions::default()))
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_parse_from_zip_archive() {
        let dir = tempfile::tempdir().unwrap();
        let zip = dir.path().join("export.zip");
        workspace()
            .messages("general", "2024-01-01", json!([slack_message("U1", "zipped", "1.000")]))
            .write_zip(&zip);

        let mut source = ZipSource::open(&zip).unwrap();
        let export = SlackParser::new(ParseOptions::new("acme")).parse(&mut source).unwrap();
        assert_eq!(export.posts_for("C1")[0].text, "zipped");
    }

    #[test]
    fn test_reconcile_against_existing_users() {
        let dir = tempfile::tempdir().unwrap();
        workspace()
            .messages("general", "2024-01-01", json!([slack_message("U1", "hello", "1.000")]))
            .write_to(dir.path());
        let mut model = slack_model(dir.path(), TransformOptions::default());

        let directory = JsonUserDirectory::from_users(vec![DirectoryUser {
            username: "alice.l".into(),
            email: "alice@example.com".into(),
        }]);
        let report = reconcile_users(&mut model, &directory);

        assert_eq!(report.renamed.len(), 1);
        let lines = export_lines(&model);
        let post = lines.iter().find(|l| l["type"] == "post").unwrap();
        assert_eq!(post["post"]["user"], "alice.l");
    }
}

mod telegram {
    use super::*;
    use pretty_assertions::assert_eq;

    fn telegram_model(root: &Path) -> Intermediate {
        let mut source = DirSource::open(root).unwrap();
        let export = TelegramParser::new(ParseOptions::new("acme")).parse(&mut source).unwrap();
        let emoji = EmojiTable::builtin();
        Transformer::new(&emoji, TransformOptions::default().with_default_email_domain("tg.example"), root)
            .unwrap()
            .transform_telegram(&export)
            .unwrap()
    }

    #[test]
    fn test_group_chat_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let mut thumbs = telegram_message(2, "user2", "Bob", 1_700_000_060, json!("welcome"));
        thumbs["reply_to_message_id"] = json!(1);
        let mut reacted = telegram_message(
            1,
            "user1",
            "Alice",
            1_700_000_000,
            json!(["hi ", {"type": "bold", "text": "team"}]),
        );
        reacted["reactions"] = json!([
            {"type": "emoji", "count": 1, "emoji": "👍", "recent": [{"from": "Bob", "from_id": "user2", "date": "2024-01-01T00:00:00"}]},
            {"type": "custom_emoji", "count": 1, "document_id": "stickers/x.webp", "recent": [{"from": "Bob", "from_id": "user2"}]}
        ]);
        let document = telegram_chat("Rust Chat", "private_supergroup", 77, json!([reacted, thumbs]));
        write(
            &dir.path().join("ChatExport_2024"),
            "result.json",
            &serde_json::to_vec(&document).unwrap(),
        );

        let model = telegram_model(dir.path());
        let lines = export_lines(&model);

        assert_eq!(line_types(&lines), vec!["version", "channel", "user", "user", "post"]);
        assert_eq!(lines[1]["channel"]["type"], "P");
        assert_eq!(lines[1]["channel"]["display_name"], "Rust Chat");
        assert_eq!(lines[2]["user"]["username"], "user1");
        assert_eq!(lines[2]["user"]["email"], "user1@tg.example");

        let post = &lines[4]["post"];
        assert_eq!(post["message"], "hi **team**");
        assert_eq!(post["create_at"], 1_700_000_000_000_i64);
        assert_eq!(post["replies"][0]["message"], "welcome");
        assert_eq!(post["reactions"], json!([{"user": "user2", "emoji_name": "+1", "create_at": 1_700_000_000_000_i64}]));
    }

    #[test]
    fn test_personal_chat_is_direct() {
        let dir = tempfile::tempdir().unwrap();
        let document = telegram_chat(
            "Bob",
            "personal_chat",
            5,
            json!([
                telegram_message(1, "user1", "Alice", 10, json!("ping")),
                telegram_message(2, "user2", "Bob", 20, json!("pong"))
            ]),
        );
        write(dir.path(), "result.json", &serde_json::to_vec(&document).unwrap());

        let lines = export_lines(&telegram_model(dir.path()));
        assert_eq!(
            line_types(&lines),
            vec!["version", "user", "user", "direct_channel", "direct_post", "direct_post"]
        );
        assert_eq!(lines[3]["direct_channel"]["members"], json!(["user1", "user2"]));
    }
}

mod grid {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_grid_export_splits_into_importable_team_archives() {
        let work = tempfile::tempdir().unwrap();
        let root = work.path().join("extracted");
        SlackExportBuilder::new()
            .user("U1", "alice", "alice@example.com")
            .user("U2", "bob", "bob@example.com")
            .channel("C1", "red-general", &["U1"])
            .channel("C2", "blue-general", &["U2"])
            .channel("C3", "nowhere", &["U1"])
            .messages(
                "red-general",
                "2024-01-01",
                json!([
                    grid_message("U1", "no team yet", "1.000", ""),
                    grid_message("U1", "red", "2.000", "T1"),
                    grid_message("U1", "blue?", "3.000", "T2")
                ]),
            )
            .messages("blue-general", "2024-01-01", json!([grid_message("U2", "blue", "1.000", "T2")]))
            .messages("nowhere", "2024-01-01", json!([grid_message("U1", "lost", "1.000", "")]))
            .write_to(&root);

        let archive = ZipArchiveIo::new();
        let teams = TeamMap::from_pairs([("T1", "red"), ("T2", "blue")]);
        let report = TeamPartitioner::new(&archive, teams)
            .partition(&root, &work.path().join("teams"))
            .unwrap();

        assert_eq!(report.teams.len(), 2);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].dir, "nowhere");

        let red = report.teams.iter().find(|t| t.team == "red").unwrap();
        let mut source = ZipSource::open(&red.path).unwrap();
        let export = SlackParser::new(ParseOptions::new("red")).parse(&mut source).unwrap();
        assert_eq!(export.public_channels.len(), 1);
        assert_eq!(export.public_channels[0].name, "red-general");
        assert_eq!(export.users.len(), 2);

        let emoji = EmojiTable::builtin();
        let model = Transformer::new(&emoji, TransformOptions::default(), work.path())
            .unwrap()
            .transform_slack(&export)
            .unwrap();
        let texts: Vec<&str> = model.posts.iter().map(|p| p.message.as_str()).collect();
        assert_eq!(texts, vec!["no team yet", "red", "blue?"]);
    }
}
