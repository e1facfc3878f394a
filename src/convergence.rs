use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    Converged,
    Diverged {
        daemon_text: String,
        editor_text: String,
    },
}

impl Verdict {
    pub fn is_converged(&self) -> bool {
        matches!(self, Verdict::Converged)
    }

    /// Index of the first UTF-16 unit where the two texts differ
    pub fn first_difference(&self) -> Option<usize> {
        match self {
            Verdict::Converged => None,
            Verdict::Diverged {
                daemon_text,
                editor_text,
            } => {
                let mut a = daemon_text.encode_utf16();
                let mut b = editor_text.encode_utf16();
                let mut index = 0;
                loop {
                    match (a.next(), b.next()) {
                        (Some(x), Some(y)) if x == y => index += 1,
                        (None, None) => return None,
                        _ => return Some(index),
                    }
                }
            }
        }
    }
}

/// Exact comparison, no trimming or newline normalization.
pub fn check(daemon_text: &str, editor_text: &str) -> Verdict {
    if daemon_text == editor_text {
        Verdict::Converged
    } else {
        Verdict::Diverged {
            daemon_text: daemon_text.to_string(),
            editor_text: editor_text.to_string(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn same_text_converges() {
        assert_eq!(check("hello!", "hello!"), Verdict::Converged);
        assert_eq!(check("", ""), Verdict::Converged);
    }

    #[test]
    fn no_normalization() {
        assert!(!check("hello", "hello\n").is_converged());
        assert!(!check(" hello", "hello").is_converged());
        assert!(!check("a\r\nb", "a\nb").is_converged());
    }

    #[test]
    fn diverged_keeps_both_texts() {
        let verdict = check("ab🥕", "ab💚");
        assert_eq!(
            verdict,
            Verdict::Diverged {
                daemon_text: "ab🥕".into(),
                editor_text: "ab💚".into(),
            }
        );
        assert_eq!(verdict.first_difference(), Some(2));
        assert_eq!(check("abc", "ab").first_difference(), Some(2));
    }

    #[test]
    fn arb_symmetric() {
        arbtest::arbtest(|u| {
            let a: String = u.arbitrary()?;
            let b: String = if u.arbitrary()? { a.clone() } else { u.arbitrary()? };
            assert_eq!(check(&a, &b).is_converged(), check(&b, &a).is_converged());
            assert!(check(&a, &a).is_converged());
            Ok(())
        });
    }
}
