//! Prompts sent to the language model and the fixed fallbacks used when it
//! fails

use jobquest_core::{AnswerEvaluation, MAX_ANSWER_SCORE};
use jobquest_networking::CompletionRequest;

/// Score given when the model cannot be reached or understood
pub const FALLBACK_SCORE: i64 = 25;

pub const FALLBACK_FEEDBACK: &str =
    "¡Gracias por tu respuesta! No pude evaluarla en detalle, pero sumaste puntos por practicar.";

const QUESTION_SYSTEM: &str = "\
Eres un entrevistador técnico de una bolsa de empleo. \
Generas preguntas de práctica claras y concretas para candidatos. \
Responde únicamente con JSON válido, sin texto adicional.";

const SCORING_SYSTEM: &str = "\
Eres un evaluador de entrevistas. Calificas respuestas de candidatos de forma justa y breve. \
Responde únicamente con JSON válido, sin texto adicional.";

pub fn question_request(skill: &str, count: usize) -> CompletionRequest {
    CompletionRequest::new(
        QUESTION_SYSTEM,
        format!(
            "Genera exactamente {count} preguntas de entrevista para evaluar la habilidad \"{skill}\". \
             Varía la dificultad de básica a avanzada. \
             Formato: {{\"questions\": [\"pregunta 1\", \"pregunta 2\"]}}"
        ),
    )
}

pub fn scoring_request(skill: &str, question: &str, answer: &str) -> CompletionRequest {
    CompletionRequest::new(
        SCORING_SYSTEM,
        format!(
            "Habilidad: {skill}\nPregunta: {question}\nRespuesta del candidato: {answer}\n\n\
             Califica la respuesta de 0 a {MAX_ANSWER_SCORE} y da una retroalimentación de una o dos frases. \
             Formato: {{\"score\": <número>, \"feedback\": \"<texto>\"}}"
        ),
    )
    .with_temperature(0.2)
}

/// Five template questions about `skill`
pub fn fallback_questions(skill: &str) -> Vec<String> {
    vec![
        format!("¿Qué es {skill} y en qué situaciones lo has utilizado?"),
        format!("Describe un proyecto en el que aplicaste {skill}. ¿Cuál fue tu aporte?"),
        format!("¿Cuáles son los errores más comunes al trabajar con {skill} y cómo los evitas?"),
        format!("¿Cómo explicarías {skill} a alguien que nunca lo ha usado?"),
        format!("¿Qué harías para seguir mejorando tus conocimientos de {skill}?"),
    ]
}

pub fn fallback_evaluation() -> AnswerEvaluation {
    AnswerEvaluation {
        score: FALLBACK_SCORE,
        feedback: FALLBACK_FEEDBACK.to_string(),
    }
}
