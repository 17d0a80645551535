//! Demo catalog for local development.

use prep_core::model::{Exam, ExamId, Objective, ObjectiveId, QuestionDraft, QuestionSource};
use prep_core::selection::StudyQuestionQuery;

use crate::repository::{Storage, StorageError};

struct ExamSeed {
    id: u64,
    vendor: &'static str,
    code: &'static str,
    name: &'static str,
    passing_score: u32,
    time_limit_minutes: u32,
    question_count: u32,
    objectives: &'static [(u64, &'static str, &'static str, u32)],
}

/// `(objective id, text, options, correct indexes, explanation, difficulty)`
type QuestionSeed = (
    u64,
    &'static str,
    &'static [&'static str],
    &'static [usize],
    &'static str,
    u8,
);

const EXAMS: &[ExamSeed] = &[
    ExamSeed {
        id: 1,
        vendor: "CompTIA",
        code: "SY0-701",
        name: "CompTIA Security+",
        passing_score: 83,
        time_limit_minutes: 90,
        question_count: 90,
        objectives: &[
            (101, "1.0", "General Security Concepts", 12),
            (102, "2.0", "Threats, Vulnerabilities, and Mitigations", 22),
            (103, "3.0", "Security Architecture", 18),
            (104, "4.0", "Security Operations", 28),
            (105, "5.0", "Security Program Management and Oversight", 20),
        ],
    },
    ExamSeed {
        id: 2,
        vendor: "CompTIA",
        code: "N10-009",
        name: "CompTIA Network+",
        passing_score: 80,
        time_limit_minutes: 90,
        question_count: 90,
        objectives: &[
            (201, "1.0", "Networking Concepts", 23),
            (202, "2.0", "Network Implementation", 20),
            (203, "3.0", "Network Operations", 19),
            (204, "4.0", "Network Security", 14),
            (205, "5.0", "Network Troubleshooting", 24),
        ],
    },
    ExamSeed {
        id: 3,
        vendor: "AWS",
        code: "SAA-C03",
        name: "AWS Certified Solutions Architect - Associate",
        passing_score: 72,
        time_limit_minutes: 130,
        question_count: 65,
        objectives: &[
            (301, "1", "Design Secure Architectures", 30),
            (302, "2", "Design Resilient Architectures", 26),
            (303, "3", "Design High-Performing Architectures", 24),
            (304, "4", "Design Cost-Optimized Architectures", 20),
        ],
    },
];

const QUESTIONS: &[(u64, &[QuestionSeed])] = &[
    (
        1,
        &[
            (
                101,
                "Which principle ensures data has not been altered in transit?",
                &["Confidentiality", "Integrity", "Availability", "Non-repudiation"],
                &[1],
                "Integrity guarantees data is unmodified; hashes are the usual control.",
                1,
            ),
            (
                102,
                "An attacker sends emails impersonating the CFO to request wire transfers. What is this?",
                &["Whaling", "Business email compromise", "Vishing", "Smishing"],
                &[1],
                "BEC impersonates an executive or partner to trigger payments.",
                2,
            ),
            (
                103,
                "Which TWO controls reduce the blast radius of a compromised workload?",
                &["Network segmentation", "Least privilege", "Longer passwords", "Screen locks"],
                &[0, 1],
                "Segmentation and least privilege both limit lateral movement.",
                3,
            ),
            (
                104,
                "Which log source best detects a pass-the-hash attack on Windows?",
                &["Firewall logs", "Security event logs", "DNS logs", "DHCP logs"],
                &[1],
                "Logon events (4624 type 3 with NTLM) reveal pass-the-hash.",
                4,
            ),
            (
                105,
                "Which document defines the maximum tolerable data loss?",
                &["RTO", "RPO", "MTTR", "SLA"],
                &[1],
                "Recovery point objective expresses acceptable data loss in time.",
                3,
            ),
        ],
    ),
    (
        2,
        &[
            (
                201,
                "Which OSI layer does a router primarily operate at?",
                &["Layer 1", "Layer 2", "Layer 3", "Layer 4"],
                &[2],
                "Routers forward packets based on layer 3 addresses.",
                1,
            ),
            (
                202,
                "Which protocol provides loop prevention on switched networks?",
                &["STP", "OSPF", "VRRP", "LACP"],
                &[0],
                "Spanning Tree Protocol blocks redundant paths.",
                2,
            ),
            (
                205,
                "A host has a 169.254.x.x address. What is the most likely cause?",
                &["DNS failure", "DHCP server unreachable", "Duplicate MAC", "Wrong gateway"],
                &[1],
                "APIPA addresses are self-assigned when DHCP fails.",
                2,
            ),
        ],
    ),
    (
        3,
        &[
            (
                302,
                "Which service combination gives a multi-AZ, self-healing web tier?",
                &[
                    "EC2 Auto Scaling with an Application Load Balancer",
                    "A single large EC2 instance",
                    "S3 static hosting only",
                    "Lambda@Edge only",
                ],
                &[0],
                "Auto Scaling across AZs behind an ALB replaces unhealthy instances.",
                3,
            ),
            (
                304,
                "Which S3 storage class suits data accessed once a quarter with millisecond retrieval?",
                &[
                    "S3 Standard",
                    "S3 Glacier Deep Archive",
                    "S3 Standard-IA",
                    "S3 Glacier Flexible Retrieval",
                ],
                &[2],
                "Standard-IA is cheaper for infrequent access but still retrieves instantly.",
                2,
            ),
        ],
    ),
];

/// What a seeding run wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub exams: u32,
    pub objectives: u32,
    pub questions: u32,
}

/// Upsert the demo exams and objectives, and add questions to exams that have none.
///
/// # Errors
///
/// Returns `StorageError` if any write fails or the demo data does not validate.
pub async fn seed_demo(storage: &Storage) -> Result<SeedReport, StorageError> {
    let mut report = SeedReport::default();

    for seed in EXAMS {
        let exam = Exam::new(
            ExamId::new(seed.id),
            seed.vendor,
            seed.code,
            seed.name,
            seed.passing_score,
            seed.time_limit_minutes,
            seed.question_count,
            true,
        )
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
        storage.exams.upsert_exam(&exam).await?;
        report.exams += 1;

        for &(id, code, title, weight) in seed.objectives {
            let objective = Objective::new(ObjectiveId::new(id), exam.id(), code, title, weight)
                .map_err(|e| StorageError::Serialization(e.to_string()))?;
            storage.exams.upsert_objective(&objective).await?;
            report.objectives += 1;
        }
    }

    for &(exam_id, questions) in QUESTIONS {
        let exam_id = ExamId::new(exam_id);
        let existing = storage
            .questions
            .study_questions(&StudyQuestionQuery::new(exam_id).with_limit(1), &[])
            .await?;
        if !existing.is_empty() {
            continue;
        }

        for &(objective, text, options, correct, explanation, difficulty) in questions {
            let draft = QuestionDraft {
                exam_id,
                objective_id: ObjectiveId::new(objective),
                text: text.to_string(),
                options: options.iter().map(ToString::to_string).collect(),
                correct_answers: correct.to_vec(),
                explanation: Some(explanation.to_string()),
                difficulty,
                source: QuestionSource::Manual,
            };
            let question = draft
                .validate()
                .map_err(|e| StorageError::Serialization(e.to_string()))?;
            storage.questions.insert_question(&question).await?;
            report.questions += 1;
        }
    }

    tracing::info!(
        exams = report.exams,
        objectives = report.objectives,
        questions = report.questions,
        "seeded demo catalog"
    );
    Ok(report)
}
