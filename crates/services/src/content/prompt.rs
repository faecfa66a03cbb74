use std::fmt::Write;

use curriculum_core::model::Chapter;

const QUESTION_COUNT: usize = 10;

fn outline(chapter: &Chapter) -> String {
    let mut out = format!("Chapter: {}\n", chapter.title());
    for topic in chapter.topics() {
        let _ = writeln!(out, "- {}", topic.title());
    }
    out
}

pub(crate) fn remediation(parent: &Chapter, concepts: &[String]) -> String {
    format!(
        "A learner failed the test for the chapter below and needs to review these concepts: {}.\n\n\
         {}\n\
         Write one short remediation chapter that targets only those concepts.\n\
         Reply with JSON only, in this shape:\n\
         {{\"title\": string, \"topics\": [{{\"title\": string, \"content\": string, \"resources\": [url]}}]}}",
        concepts.join(", "),
        outline(parent),
    )
}

pub(crate) fn chapter_test(chapter: &Chapter) -> String {
    format!(
        "{}\n\
         Write {QUESTION_COUNT} test questions covering the topics above.\n\
         Reply with a JSON array only. Each element:\n\
         {{\"question\": string, \"options\": [string], \"correctAnswer\": option index or text, \
         \"concept\": string, \"difficulty\": \"easy\" | \"medium\" | \"hard\", \"explanation\": string}}",
        outline(chapter),
    )
}
