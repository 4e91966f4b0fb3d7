//! The two shipped rulesets. Both are built from the rule code library at
//! engine init; their hashes are the stable identities persistence sees.

use crate::rule::{Rule, RuleError, RuleListKind, Ruleset};
use crate::rules::RuleRegistry;
use crate::score::Score;

fn points(p: i32) -> Score {
    Score::points(p)
}

fn doubles(d: u16) -> Score {
    Score::doubles(d)
}

fn limits(l: f64) -> Score {
    Score::limits(l)
}

struct Builder<'a> {
    ruleset: Ruleset,
    registry: &'a RuleRegistry,
}

impl<'a> Builder<'a> {
    fn new(name: &str, description: &str, registry: &'a RuleRegistry) -> Builder<'a> {
        Builder {
            ruleset: Ruleset::new(name, description),
            registry,
        }
    }

    fn rule(&mut self, kind: RuleListKind, name: &str, definition: &str, score: Score) {
        self.try_rule(kind, name, definition, score)
            .expect("builtin ruleset entry");
    }

    fn try_rule(
        &mut self,
        kind: RuleListKind,
        name: &str,
        definition: &str,
        score: Score,
    ) -> Result<(), RuleError> {
        let rule = Rule::resolve(name, definition, score, None, self.registry)?;
        self.ruleset.add(kind, rule)
    }

    fn parameter(&mut self, name: &str, ty: &str, value: &str) {
        let rule = Rule::parameter(name, ty, value).expect("builtin parameter entry");
        self.ruleset
            .add(RuleListKind::Parameter, rule)
            .expect("builtin parameter entry");
    }

    fn build(self) -> Ruleset {
        self.ruleset
    }
}

/// The common classical Chinese core both shipped rulesets start from.
fn classical_core(b: &mut Builder) {
    use RuleListKind::*;

    // Meld points.
    b.rule(Meld, "Pair of Own Wind", "FOwnWindPair", points(2));
    b.rule(Meld, "Pair of Round Wind", "FRoundWindPair", points(2));
    b.rule(Meld, "Pair of Dragons", "FDragonPair", points(2));
    b.rule(Meld, "Exposed Pung of Minors", "FExposedMinorPung", points(2));
    b.rule(Meld, "Exposed Pung of Terminals", "FExposedTerminalsPung", points(4));
    b.rule(Meld, "Exposed Pung of Honors", "FExposedHonorsPung", points(4));
    b.rule(Meld, "Concealed Pung of Minors", "FConcealedMinorPung", points(4));
    b.rule(Meld, "Concealed Pung of Terminals", "FConcealedTerminalsPung", points(8));
    b.rule(Meld, "Concealed Pung of Honors", "FConcealedHonorsPung", points(8));
    b.rule(Meld, "Exposed Kong of Minors", "FExposedMinorKong", points(8));
    b.rule(Meld, "Exposed Kong of Terminals", "FExposedTerminalsKong", points(16));
    b.rule(Meld, "Exposed Kong of Honors", "FExposedHonorsKong", points(16));
    b.rule(Meld, "Concealed Kong of Minors", "FConcealedMinorKong", points(16));
    b.rule(Meld, "Concealed Kong of Terminals", "FConcealedTerminalsKong", points(32));
    b.rule(Meld, "Concealed Kong of Honors", "FConcealedHonorsKong", points(32));
    b.rule(Meld, "Flower", "FBonus||Ogroup=flower", points(4));
    b.rule(Meld, "Season", "FBonus||Ogroup=season", points(4));

    // Meld doubles.
    b.rule(Meld, "Pung/Kong of Dragons", "FDragonPungKong", doubles(1));
    b.rule(Meld, "Pung/Kong of Own Wind", "FOwnWindPungKong", doubles(1));
    b.rule(Meld, "Pung/Kong of Round Wind", "FRoundWindPungKong", doubles(1));

    // Hand doubles, winners and losers alike.
    b.rule(Hand, "Own Flower and Own Season", "FOwnFlowerOwnSeason", doubles(1));
    b.rule(Hand, "All Flowers", "FAllFlowers", doubles(1));
    b.rule(Hand, "All Seasons", "FAllSeasons", doubles(1));
    b.rule(Hand, "Three Concealed Pongs", "FThreeConcealedPongs", doubles(1));
    b.rule(Hand, "Little Three Dragons", "FLittleThreeDragons", doubles(1));
    b.rule(Hand, "Big Three Dragons", "FBigThreeDragons", doubles(2));
    b.rule(Hand, "Little Four Joys", "FLittleFourJoys", doubles(1));
    b.rule(Hand, "Big Four Joys", "FBigFourJoys", doubles(2));
    b.rule(Hand, "Zero Point Hand", "FZeroPointHand", doubles(1));
    b.rule(Hand, "No Chow", "FNoChow", doubles(1));
    b.rule(Hand, "Only Concealed Melds", "FOnlyConcealedMelds", doubles(1));
    b.rule(Hand, "False Color Game", "FFalseColorGame", doubles(1));
    b.rule(Hand, "True Color Game", "FTrueColorGame", doubles(3));
    b.rule(Hand, "Only Terminals and Honors", "FOnlyMajors", doubles(1));

    // Winner rules: the base award, the last-tile bonuses, the limits.
    b.rule(Winner, "Mah Jongg", "FMahJongg", points(20));
    b.rule(Winner, "Last Tile Taken from Wall", "FLastTileFromWall", points(2));
    b.rule(
        Winner,
        "Last Tile Completes Pair of 2..8",
        "FLastTileCompletesPairMinor",
        points(2),
    );
    b.rule(
        Winner,
        "Last Tile Completes Pair of Terminals or Honors",
        "FLastTileCompletesPairMajor",
        points(4),
    );
    b.rule(
        Winner,
        "Last Tile is Only Possible Tile",
        "FLastTileOnlyPossible",
        points(4),
    );
    b.rule(
        Winner,
        "Mah Jongg with Original Call",
        "FMahJonggWithOriginalCall",
        doubles(1),
    );
    b.rule(Winner, "Last Tile from Dead Wall", "FLastTileFromDeadWall", doubles(1));
    b.rule(Winner, "Last Tile is Last Tile of Wall", "FIsLastTileFromWall", doubles(1));
    b.rule(
        Winner,
        "Last Tile is Last Tile of Wall Discarded",
        "FIsLastTileFromWallDiscarded",
        doubles(1),
    );
    b.rule(Winner, "Robbing the Kong", "FRobbingKong", doubles(1));
    b.rule(Winner, "Blessing of Heaven", "FBlessingOfHeaven", limits(1.0));
    b.rule(Winner, "Blessing of Earth", "FBlessingOfEarth", limits(1.0));
    b.rule(Winner, "Twofold Fortune", "FTwofoldFortune", limits(1.0));
    b.rule(
        Winner,
        "Gathering the Plum Blossom from the Roof",
        "FGatheringPlumBlossomFromRoof",
        limits(1.0),
    );
    b.rule(
        Winner,
        "Plucking the Moon from the Bottom of the Sea",
        "FPluckingMoonFromBottomOfSea",
        limits(1.0),
    );
    b.rule(
        Winner,
        "Scratching a Carrying Pole",
        "FScratchingACarryingPole",
        limits(1.0),
    );
    b.rule(Winner, "Hidden Treasure", "FHiddenTreasure", limits(1.0));
    b.rule(Winner, "All Honors", "FOnlyHonors", limits(1.0));
    b.rule(Winner, "All Terminals", "FAllTerminals", limits(1.0));
    b.rule(Winner, "All Greens", "FAllGreen", limits(1.0));
    b.rule(Winner, "Fourfold Plenty", "FFourfoldPlenty", limits(1.0));
    b.rule(
        Winner,
        "Four Blessings Hovering over the Door",
        "FFourBlessingsHoveringOverTheDoor",
        limits(1.0),
    );
    b.rule(
        Winner,
        "Concealed True Color Game",
        "FConcealedTrueColorGame",
        limits(1.0),
    );
    b.rule(
        Winner,
        "Nine Consecutive East Wins",
        "FNineEastWins||Oneedwins=9",
        Score::ZERO,
    );

    // Losers.
    b.rule(Loser, "Dangerous Game", "FDangerousGame||Opayforall", Score::ZERO);

    // Penalties.
    b.rule(
        Penalty,
        "False Naming of Discard, Claimed for Chow/Pung/Kong",
        "FPenalty||Opayers=1 payees=1",
        points(-50),
    );
    b.rule(
        Penalty,
        "False Naming of Discard, Claimed for Mah Jongg",
        "FPenalty||Opayers=1 payees=3",
        points(-300),
    );
    b.rule(
        Penalty,
        "False Declaration of Mah Jongg by One Player",
        "FPenalty||Opayers=1 payees=3",
        points(-300),
    );
    b.rule(
        Penalty,
        "False Declaration of Mah Jongg by Two Players",
        "FPenalty||Opayers=2 payees=2",
        points(-600),
    );
    b.rule(
        Penalty,
        "False Declaration of Mah Jongg by Three Players",
        "FPenalty||Opayers=3 payees=1",
        points(-900),
    );

    // Common parameters.
    b.parameter("Points Needed for Mah Jongg", "int", "0");
    b.parameter("Minimum Doubles Needed for Mah Jongg", "int", "0");
    b.parameter("Minimum Number of Rounds in Game", "int", "4");
    b.parameter("Play with Bonus Tiles", "bool", "true");
    b.parameter("Claim Timeout", "int", "10");
    b.parameter("Seat Exchange", "str", "SWEN,SE,WE");
    b.parameter("Play with the Roof off", "bool", "false");
}

/// Classical Chinese as played by the Deutsche Mah-Jongg-Liga.
pub fn classical_chinese_dmjl(registry: &RuleRegistry) -> Ruleset {
    let mut b = Builder::new(
        "Classical Chinese DMJL",
        "Classical Chinese as defined by the Deutsche Mah-Jongg-Liga e.V.",
        registry,
    );
    classical_core(&mut b);
    use RuleListKind::*;
    b.rule(MahJongg, "Standard Mah Jongg", "FStandardMahJongg", Score::ZERO);
    b.rule(MahJongg, "Nine Gates", "FGatesOfHeaven", limits(1.0));
    b.rule(MahJongg, "Thirteen Orphans", "FThirteenOrphans", limits(1.0));
    b.rule(MahJongg, "Squirming Snake", "FSquirmingSnake", limits(1.0));
    b.rule(Winner, "Three Great Scholars", "FThreeGreatScholars", limits(1.0));
    b.parameter("Points for a Limit Hand", "int", "500");
    b.parameter("Maximum Number of Chows", "int", "4");
    b.parameter("Must Declare a Calling Hand", "bool", "false");
    b.parameter("Arrange Discarded Tiles in Rows", "bool", "false");
    b.parameter("Leave Holes for Claimed Discards", "bool", "false");
    b.build()
}

/// Classical Chinese as played by the British Mah-Jong Association.
pub fn classical_chinese_bmja(registry: &RuleRegistry) -> Ruleset {
    let mut b = Builder::new(
        "Classical Chinese BMJA",
        "Classical Chinese as defined by the British Mah-Jong Association",
        registry,
    );
    classical_core(&mut b);
    use RuleListKind::*;
    b.rule(MahJongg, "Standard Mah Jongg", "FStandardMahJongg", Score::ZERO);
    b.rule(MahJongg, "Gates of Heaven", "FGatesOfHeaven", limits(1.0));
    b.rule(MahJongg, "Thirteen Unique Wonders", "FThirteenOrphans", limits(1.0));
    b.rule(MahJongg, "Wriggling Snake", "FWrigglingSnake", limits(1.0));
    b.rule(MahJongg, "Triple Knitting", "FTripleKnitting", limits(0.5));
    b.rule(MahJongg, "Knitting", "FKnitting", limits(0.5));
    b.rule(MahJongg, "All Pair Honors", "FAllPairHonors", limits(0.5));
    b.rule(
        Winner,
        "Three Great Scholars",
        "FThreeGreatScholars||Onochow",
        limits(1.0),
    );
    b.rule(Winner, "Buried Treasure", "FBuriedTreasure", limits(1.0));
    b.parameter("Points for a Limit Hand", "int", "1000");
    b.parameter("Maximum Number of Chows", "int", "1");
    b.parameter("Must Declare a Calling Hand", "bool", "true");
    b.parameter("Arrange Discarded Tiles in Rows", "bool", "true");
    b.parameter("Leave Holes for Claimed Discards", "bool", "true");
    b.build()
}

/// The BMJA table with the score roof removed.
pub fn classical_chinese_bmja_roof_off(registry: &RuleRegistry) -> Ruleset {
    let mut ruleset = classical_chinese_bmja(registry);
    ruleset.name = "Classical Chinese BMJA (Roof Off)".to_string();
    let rule = Rule::parameter("Play with the Roof off", "bool", "true")
        .expect("builtin parameter entry");
    ruleset
        .add(RuleListKind::Parameter, rule)
        .expect("builtin parameter entry");
    ruleset
}
