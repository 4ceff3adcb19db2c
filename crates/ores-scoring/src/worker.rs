//! Worker side of the process pool: read request lines, score, answer.
use std::io::{self, BufRead, Write};

use crate::error::{Result, ScoreError};
use crate::pool::catch_panic;
use crate::protocol::{WorkerRequest, WorkerResponse, PROTOCOL_ERROR};
use crate::scorer::Scorer;

/// Serve the worker protocol until `input` reaches EOF.
///
/// Scorer failures and panics are answered as `err` responses; only I/O
/// failures on the pipes end the loop early.
pub fn serve<S, R, W>(scorer: &S, input: R, mut output: W) -> Result<()>
where
    S: Scorer,
    R: BufRead,
    W: Write,
{
    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<WorkerRequest>(&line) {
            Ok(request) => handle(scorer, request),
            Err(e) => WorkerResponse::Err(ScoreError::new(PROTOCOL_ERROR, e.to_string())),
        };

        serde_json::to_writer(&mut output, &response)?;
        output.write_all(b"\n")?;
        output.flush()?;
    }
    Ok(())
}

/// [`serve`] on the process's own stdin and stdout.
pub fn serve_stdio<S: Scorer>(scorer: &S) -> Result<()> {
    tracing::debug!("Worker {} serving on stdio", std::process::id());
    serve(scorer, io::stdin().lock(), io::stdout().lock())
}

fn handle<S: Scorer>(scorer: &S, request: WorkerRequest) -> WorkerResponse {
    let WorkerRequest {
        request,
        rev_id,
        model_name,
        root_cache,
    } = request;

    tracing::trace!("Scoring {}", request.format(rev_id, &model_name));
    match catch_panic(|| scorer.score(&request, rev_id, &model_name, &root_cache)) {
        Ok(result) => WorkerResponse::from(result),
        Err(message) => WorkerResponse::Err(ScoreError::new("WorkerPanic", message)),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use serde_json::json;

    use super::*;
    use crate::request::ScoreRequest;
    use crate::scorer::ScoreFn;
    use crate::types::{RevId, RootCache, Score};

    fn scorer(
        _: &ScoreRequest,
        rev_id: RevId,
        model_name: &str,
        root_cache: &RootCache,
    ) -> std::result::Result<Score, ScoreError> {
        match model_name {
            "panics" => panic!("no model"),
            "damaging" => Err(ScoreError::new("TextDeleted", "Text deleted")),
            _ => Ok(json!({"rev_id": rev_id, "cache": root_cache})),
        }
    }

    fn request_line(rev_id: RevId, model_name: &str) -> String {
        serde_json::to_string(&WorkerRequest {
            request: ScoreRequest::new("enwiki"),
            rev_id,
            model_name: model_name.into(),
            root_cache: json!("ctx"),
        })
        .unwrap()
    }

    #[test]
    fn test_serve_answers_each_line() {
        let input = [
            request_line(1, "wp10"),
            String::new(),
            request_line(2, "damaging"),
            request_line(3, "panics"),
            "not json".to_string(),
        ]
        .join("\n");

        let mut output = Vec::new();
        serve(&ScoreFn::new(scorer), Cursor::new(input), &mut output).unwrap();

        let responses: Vec<WorkerResponse> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(responses.len(), 4);
        assert_eq!(
            responses[0],
            WorkerResponse::Ok(json!({"rev_id": 1, "cache": "ctx"}))
        );
        assert_eq!(
            responses[1],
            WorkerResponse::Err(ScoreError::new("TextDeleted", "Text deleted"))
        );
        assert_eq!(
            responses[2],
            WorkerResponse::Err(ScoreError::new("WorkerPanic", "panicked: no model"))
        );
        assert!(matches!(&responses[3], WorkerResponse::Err(e) if e.kind == "ProtocolError"));
    }
}
