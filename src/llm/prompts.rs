//! Prompt text: the contract between the session and the model.
//!
//! The system instruction has exactly two modes: the default coding
//! assistant, or the interview assistant primed with resume text.

use crate::capture::TargetLanguage;

pub const TEMPERATURE: f32 = 0.3;
pub const MAX_TOKENS: u32 = 1500;

/// Default system instruction, used when no resume context is active.
pub fn coding_assistant_prompt(language: TargetLanguage) -> String {
    format!(
        "You are a coding/aptitude assistant that provides solutions in {}.",
        language
    )
}

/// Resume-mode system instruction. Replaces the coding assistant prompt.
pub fn interview_assistant_prompt(resume: &str) -> String {
    format!(
        "You are an interview assistant. The following is the user's resume context: {}. \
         Answer all questions as if you are the user, in their perspective, with short and best answers.",
        resume
    )
}

/// Select the system instruction for the current session state.
pub fn system_prompt(resume: Option<&str>, language: TargetLanguage) -> String {
    match resume {
        Some(text) => interview_assistant_prompt(text),
        None => coding_assistant_prompt(language),
    }
}

/// Instruction that accompanies a screenshot batch.
///
/// With several images the service is told up front that they form one
/// problem, so it reasons over them jointly.
pub fn screenshot_instruction(language: TargetLanguage, image_count: usize) -> String {
    let mut prompt = String::new();
    if image_count > 1 {
        prompt.push_str(&format!(
            "There are {} screenshots that are all part of the same question/problem. \
             Please analyze all images together and provide a comprehensive solution.\n\n",
            image_count
        ));
    }
    prompt.push_str(&format!(
        r#"You are an expert coding and aptitude interview assistant. Analyze the image(s) for either a coding problem or an aptitude/option-based question.

If it is a coding problem and a solution/code is present in the image, respond with three sections:

**Comparison:**
- Compare the provided solution with an optimized solution. If the provided solution is wrong, correct it and provide the updated solution.

**Optimized Solution:**
- The best/optimized solution in {lang}, perfectly formatted, with comments allowed.

**Complexity:**
- Time Complexity: O(n)
- Space Complexity: O(1)

If no solution is present, respond with three sections:

**Approach:**
- Three concise bullet points describing the approach, in a way that I can read directly to an interviewer.

**Solution:**
- The complete solution in {lang}, perfectly formatted, with comments allowed.

**Complexity:**
- Time Complexity: O(n)
- Space Complexity: O(1)

If it is an aptitude or option-based question, respond with exactly two sections, each with a bold heading:

**Answer:**
- The correct answer, including the option number.

**Short explanation:**
- A very short explanation of the answer.

Format your response clearly and do not include any extra commentary or markdown code blocks. Only output the sections as described above."#,
        lang = language
    ));
    prompt
}

/// One-off priming message sent right after a resume is extracted.
pub fn resume_priming_prompt(resume: &str) -> String {
    format!(
        "This is my resume. Please analyze it and remember my background for future interview \
         questions and give answers in my perspective such that I can read them directly, \
         and keep them minimal.\n\n{}",
        resume
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resume_mode_replaces_coding_mode() {
        let prompt = system_prompt(Some("Skills: Go, Rust"), TargetLanguage::Python);
        assert!(prompt.contains("Skills: Go, Rust"));
        assert!(!prompt.contains("coding/aptitude assistant"));

        let prompt = system_prompt(None, TargetLanguage::Python);
        assert!(prompt.contains("solutions in Python"));
    }

    #[test]
    fn multi_image_instruction_mentions_count() {
        let single = screenshot_instruction(TargetLanguage::Cpp, 1);
        assert!(!single.starts_with("There are"));
        assert!(single.contains("solution in C++"));

        let multi = screenshot_instruction(TargetLanguage::Java, 3);
        assert!(multi.starts_with("There are 3 screenshots"));
    }
}
